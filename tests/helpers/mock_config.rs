// ==========================================
// Mock 政策配置 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use library_core::config::PolicyConfigReader;
use library_core::domain::LibraryPolicy;
use std::error::Error;

/// Mock 配置结构（不读数据库）
#[derive(Debug, Clone, Default)]
pub struct MockPolicyConfig {
    pub policy: LibraryPolicy,
}

impl MockPolicyConfig {
    pub fn new(policy: LibraryPolicy) -> Self {
        Self { policy }
    }

    /// 小额度配置，便于触发额度违规
    pub fn strict() -> Self {
        Self::new(LibraryPolicy {
            max_books_per_period: 3,
            max_books_per_request: 2,
            max_books_per_domain: 1,
            diversity_threshold_books: 2,
            min_distinct_domains: 2,
            max_extension_days: 5,
            ..LibraryPolicy::default()
        })
    }
}

#[async_trait]
impl PolicyConfigReader for MockPolicyConfig {
    async fn get_max_books_per_period(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.max_books_per_period)
    }

    async fn get_period_days(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.period_days)
    }

    async fn get_max_books_per_request(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.max_books_per_request)
    }

    async fn get_max_books_per_domain(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.max_books_per_domain)
    }

    async fn get_domain_window_months(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.policy.domain_window_months)
    }

    async fn get_max_extension_days(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.max_extension_days)
    }

    async fn get_extension_window_months(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.policy.extension_window_months)
    }

    async fn get_min_days_between_same_book(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.min_days_between_same_book)
    }

    async fn get_max_books_per_day(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.max_books_per_day)
    }

    async fn get_max_loans_served_per_day(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.max_loans_served_per_day)
    }

    async fn get_diversity_threshold_books(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.diversity_threshold_books)
    }

    async fn get_min_distinct_domains(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.min_distinct_domains)
    }

    async fn get_availability_threshold_ratio(&self) -> Result<f64, Box<dyn Error>> {
        Ok(self.policy.availability_threshold_ratio)
    }

    async fn get_loan_days(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.loan_days)
    }

    async fn get_staff_multiplier(&self) -> Result<i32, Box<dyn Error>> {
        Ok(self.policy.staff_multiplier)
    }
}
