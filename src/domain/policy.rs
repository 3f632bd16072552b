// ==========================================
// 图书馆借阅管理系统 - 借阅政策
// ==========================================
// 职责: 借阅政策参数、规则标识、判定结果
// 红线: 所有拒绝必须给出显式原因（可解释性）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// LibraryPolicy - 借阅政策参数
// ==========================================
// 存储: config_kv 表，缺省时使用 Default
// 所有数值均为普通读者口径，馆员口径见 effective_for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryPolicy {
    // ===== 周期额度 =====
    pub max_books_per_period: i32, // NMC: 周期内最多借阅册数
    pub period_days: i32,          // PER: 周期长度（天）

    // ===== 单次请求 =====
    pub max_books_per_request: i32, // C: 单次最多借阅册数

    // ===== 领域额度 =====
    pub max_books_per_domain: i32, // D: 同一领域最多借阅册数
    pub domain_window_months: u32, // L: 领域额度统计窗口（月）

    // ===== 续借 =====
    pub max_extension_days: i32,      // LIM: 窗口内累计续借天数上限
    pub extension_window_months: u32, // 续借统计窗口（月）

    // ===== 重复借阅间隔 =====
    pub min_days_between_same_book: i32, // DELTA: 同一本书两次借阅最小间隔（天）

    // ===== 每日额度 =====
    pub max_books_per_day: i32,        // NCZ: 读者每日最多借阅册数（馆员不受限）
    pub max_loans_served_per_day: i32, // PERSIMP: 馆员每日最多经办册数

    // ===== 领域多样性 =====
    pub diversity_threshold_books: i32, // 请求册数达到该值时触发多样性检查
    pub min_distinct_domains: i32,      // 至少覆盖的不同领域数

    // ===== 可借阈值 =====
    pub availability_threshold_ratio: f64, // 可借副本低于总库存该比例时不可外借

    // ===== 借期 =====
    pub loan_days: i32,

    // ===== 馆员倍数 =====
    pub staff_multiplier: i32,
}

impl Default for LibraryPolicy {
    fn default() -> Self {
        Self {
            max_books_per_period: 10,
            period_days: 30,
            max_books_per_request: 5,
            max_books_per_domain: 3,
            domain_window_months: 3,
            max_extension_days: 14,
            extension_window_months: 3,
            min_days_between_same_book: 14,
            max_books_per_day: 4,
            max_loans_served_per_day: 20,
            diversity_threshold_books: 3,
            min_distinct_domains: 2,
            availability_threshold_ratio: 0.10,
            loan_days: 14,
            staff_multiplier: 2,
        }
    }
}

impl LibraryPolicy {
    /// 按读者身份计算生效政策
    ///
    /// # 规则
    /// - 馆员: NMC / C / D / LIM 乘以 staff_multiplier
    /// - 馆员: PER / DELTA 除以 staff_multiplier（最小 1 天）
    /// - 馆员: 不受 NCZ 每日额度限制（返回 None）
    /// - 普通读者: 原值
    ///
    /// # 返回
    /// - (生效政策, 每日额度)
    pub fn effective_for(&self, is_staff: bool) -> (LibraryPolicy, Option<i32>) {
        if !is_staff {
            return (self.clone(), Some(self.max_books_per_day));
        }

        let k = self.staff_multiplier.max(1);
        let mut p = self.clone();
        p.max_books_per_period = self.max_books_per_period.saturating_mul(k);
        p.max_books_per_request = self.max_books_per_request.saturating_mul(k);
        p.max_books_per_domain = self.max_books_per_domain.saturating_mul(k);
        p.max_extension_days = self.max_extension_days.saturating_mul(k);
        p.period_days = (self.period_days / k).max(1);
        p.min_days_between_same_book = (self.min_days_between_same_book / k).max(1);
        (p, None)
    }
}

// ==========================================
// PolicyRule - 政策规则标识
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyRule {
    EmptyRequest,        // 空请求
    DuplicateInRequest,  // 请求内重复图书
    RequestSize,         // C
    PeriodQuota,         // NMC / PER
    DailyQuota,          // NCZ
    DomainQuota,         // D / L
    DomainDiversity,     // 多样性
    ReborrowInterval,    // DELTA
    AlreadyBorrowed,     // 已持有同书
    ReadingRoomOnly,     // 仅限阅览室
    AvailabilityThreshold, // 可借副本低于阈值
    LenderNotStaff,      // 经办人非馆员
    SelfLending,         // 馆员给自己办理
    LenderDailyQuota,    // PERSIMP
    ExtensionLimit,      // LIM
    BorrowingNotActive,  // 借阅已归还
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyRule::EmptyRequest => "EMPTY_REQUEST",
            PolicyRule::DuplicateInRequest => "DUPLICATE_IN_REQUEST",
            PolicyRule::RequestSize => "REQUEST_SIZE",
            PolicyRule::PeriodQuota => "PERIOD_QUOTA",
            PolicyRule::DailyQuota => "DAILY_QUOTA",
            PolicyRule::DomainQuota => "DOMAIN_QUOTA",
            PolicyRule::DomainDiversity => "DOMAIN_DIVERSITY",
            PolicyRule::ReborrowInterval => "REBORROW_INTERVAL",
            PolicyRule::AlreadyBorrowed => "ALREADY_BORROWED",
            PolicyRule::ReadingRoomOnly => "READING_ROOM_ONLY",
            PolicyRule::AvailabilityThreshold => "AVAILABILITY_THRESHOLD",
            PolicyRule::LenderNotStaff => "LENDER_NOT_STAFF",
            PolicyRule::SelfLending => "SELF_LENDING",
            PolicyRule::LenderDailyQuota => "LENDER_DAILY_QUOTA",
            PolicyRule::ExtensionLimit => "EXTENSION_LIMIT",
            PolicyRule::BorrowingNotActive => "BORROWING_NOT_ACTIVE",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// PolicyViolation - 政策违规详情
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub rule: PolicyRule,
    pub book_id: Option<String>, // 针对单本书的违规
    pub message: String,
}

impl PolicyViolation {
    pub fn new(rule: PolicyRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            book_id: None,
            message: message.into(),
        }
    }

    pub fn for_book(rule: PolicyRule, book_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule,
            book_id: Some(book_id.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.book_id {
            Some(id) => write!(f, "[{}] book={}: {}", self.rule, id, self.message),
            None => write!(f, "[{}] {}", self.rule, self.message),
        }
    }
}

// ==========================================
// BorrowingDecision - 借阅/续借判定结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorrowingDecision {
    pub approved: bool,
    pub violations: Vec<PolicyViolation>,
}

impl BorrowingDecision {
    pub fn from_violations(violations: Vec<PolicyViolation>) -> Self {
        Self {
            approved: violations.is_empty(),
            violations,
        }
    }

    pub fn has_rule(&self, rule: PolicyRule) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }

    /// 拼接所有违规原因
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
