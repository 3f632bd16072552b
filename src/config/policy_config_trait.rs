// ==========================================
// 图书馆借阅管理系统 - 借阅政策配置读取 Trait
// ==========================================
// 职责: 定义规则引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::policy::LibraryPolicy;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// PolicyConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
// 默认值: 见 LibraryPolicy::default
#[async_trait]
pub trait PolicyConfigReader: Send + Sync {
    // ===== 周期额度 =====

    /// NMC: 周期内最多借阅册数（默认 10）
    async fn get_max_books_per_period(&self) -> Result<i32, Box<dyn Error>>;

    /// PER: 周期长度，天（默认 30）
    async fn get_period_days(&self) -> Result<i32, Box<dyn Error>>;

    /// C: 单次最多借阅册数（默认 5）
    async fn get_max_books_per_request(&self) -> Result<i32, Box<dyn Error>>;

    // ===== 领域额度 =====

    /// D: 同一领域窗口内最多借阅册数（默认 3）
    async fn get_max_books_per_domain(&self) -> Result<i32, Box<dyn Error>>;

    /// L: 领域额度统计窗口，月（默认 3）
    async fn get_domain_window_months(&self) -> Result<u32, Box<dyn Error>>;

    // ===== 续借 =====

    /// LIM: 续借窗口内累计续借天数上限（默认 14）
    async fn get_max_extension_days(&self) -> Result<i32, Box<dyn Error>>;

    /// 续借统计窗口，月（默认 3）
    async fn get_extension_window_months(&self) -> Result<u32, Box<dyn Error>>;

    /// DELTA: 同一本书两次借阅最小间隔，天（默认 14）
    async fn get_min_days_between_same_book(&self) -> Result<i32, Box<dyn Error>>;

    // ===== 每日额度 =====

    /// NCZ: 普通读者每日最多借阅册数（默认 4）
    async fn get_max_books_per_day(&self) -> Result<i32, Box<dyn Error>>;

    /// PERSIMP: 馆员每日最多经办册数（默认 20）
    async fn get_max_loans_served_per_day(&self) -> Result<i32, Box<dyn Error>>;

    // ===== 多样性 / 可借阈值 / 借期 =====

    /// 触发多样性检查的请求册数（默认 3）
    async fn get_diversity_threshold_books(&self) -> Result<i32, Box<dyn Error>>;

    /// 至少覆盖的不同领域数（默认 2）
    async fn get_min_distinct_domains(&self) -> Result<i32, Box<dyn Error>>;

    /// 可借副本阈值比例（默认 0.10）
    async fn get_availability_threshold_ratio(&self) -> Result<f64, Box<dyn Error>>;

    /// 借期，天（默认 14）
    async fn get_loan_days(&self) -> Result<i32, Box<dyn Error>>;

    /// 馆员额度倍数（默认 2）
    async fn get_staff_multiplier(&self) -> Result<i32, Box<dyn Error>>;

    /// 一次性读取全部政策参数
    async fn load_policy(&self) -> Result<LibraryPolicy, Box<dyn Error>> {
        let max_books_per_period = self.get_max_books_per_period().await?;
        let period_days = self.get_period_days().await?;
        let max_books_per_request = self.get_max_books_per_request().await?;
        let max_books_per_domain = self.get_max_books_per_domain().await?;
        let domain_window_months = self.get_domain_window_months().await?;
        let max_extension_days = self.get_max_extension_days().await?;
        let extension_window_months = self.get_extension_window_months().await?;
        let min_days_between_same_book = self.get_min_days_between_same_book().await?;
        let max_books_per_day = self.get_max_books_per_day().await?;
        let max_loans_served_per_day = self.get_max_loans_served_per_day().await?;
        let diversity_threshold_books = self.get_diversity_threshold_books().await?;
        let min_distinct_domains = self.get_min_distinct_domains().await?;
        let availability_threshold_ratio = self.get_availability_threshold_ratio().await?;
        let loan_days = self.get_loan_days().await?;
        let staff_multiplier = self.get_staff_multiplier().await?;

        Ok(LibraryPolicy {
            max_books_per_period,
            period_days,
            max_books_per_request,
            max_books_per_domain,
            domain_window_months,
            max_extension_days,
            extension_window_months,
            min_days_between_same_book,
            max_books_per_day,
            max_loans_served_per_day,
            diversity_threshold_books,
            min_distinct_domains,
            availability_threshold_ratio,
            loan_days,
            staff_multiplier,
        })
    }
}
