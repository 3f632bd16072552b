// ==========================================
// 图书馆借阅管理系统 - 借阅规则纯函数库
// ==========================================
// 职责: 借阅/续借政策的逐条判定
// 红线: 无状态、无副作用、无 I/O 操作
// 红线: 每条拒绝都必须带可读原因
// ==========================================

use crate::domain::book::BookAvailability;
use crate::domain::borrowing::Borrowing;
use crate::domain::policy::{PolicyRule, PolicyViolation};
use crate::domain::reader::Reader;
use crate::engine::domain_hierarchy::DomainHierarchy;
use chrono::{Duration, Months, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ==========================================
// BorrowingRulesCore - 纯函数工具类
// ==========================================
pub struct BorrowingRulesCore;

impl BorrowingRulesCore {
    // ==========================================
    // 时间窗口
    // ==========================================

    /// 最早可用日期（四位年份，TEXT 列按字典序比较即按日期比较）
    pub fn earliest_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    /// 最晚可用日期
    pub fn latest_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
    }

    /// 按天计算的窗口起点（含今天）
    ///
    /// # 规则
    /// - window_start = today - (days - 1)，days 最小按 1 计
    /// - 早于 earliest_date 时取 earliest_date
    ///
    /// # 示例
    /// ```
    /// use chrono::NaiveDate;
    /// use library_core::engine::BorrowingRulesCore;
    /// let today = NaiveDate::from_ymd_opt(2026, 3, 30).unwrap();
    /// let start = BorrowingRulesCore::day_window_start(today, 30);
    /// assert_eq!(start, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    /// ```
    pub fn day_window_start(today: NaiveDate, days: i32) -> NaiveDate {
        let earliest = Self::earliest_date();
        today
            .checked_sub_signed(Duration::days(days.max(1) as i64 - 1))
            .map_or(earliest, |d| d.max(earliest))
    }

    /// 按月计算的窗口起点（含起点当天）
    pub fn month_window_start(today: NaiveDate, months: u32) -> NaiveDate {
        let earliest = Self::earliest_date();
        today
            .checked_sub_months(Months::new(months))
            .map_or(earliest, |d| d.max(earliest))
    }

    /// 应还日期 = today + loan_days（晚于 latest_date 时取 latest_date）
    pub fn compute_due_date(today: NaiveDate, loan_days: i32) -> NaiveDate {
        Self::add_days_capped(today, loan_days.max(1))
    }

    /// date + days，晚于 latest_date 时取 latest_date
    pub fn add_days_capped(date: NaiveDate, days: i32) -> NaiveDate {
        let latest = Self::latest_date();
        date.checked_add_signed(Duration::days(days as i64))
            .map_or(latest, |d| d.min(latest))
    }

    // ==========================================
    // 请求本身
    // ==========================================

    pub fn check_empty_request(requested: usize) -> Option<PolicyViolation> {
        if requested == 0 {
            Some(PolicyViolation::new(
                PolicyRule::EmptyRequest,
                "借阅请求中没有图书",
            ))
        } else {
            None
        }
    }

    /// 请求内重复图书（每个重复 id 报一次，按首次重复出现顺序）
    pub fn check_duplicates(book_ids: &[String]) -> Vec<PolicyViolation> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut violations = Vec::new();
        for id in book_ids {
            if !seen.insert(id.as_str()) && reported.insert(id.as_str()) {
                violations.push(PolicyViolation::for_book(
                    PolicyRule::DuplicateInRequest,
                    id,
                    "同一请求中重复出现",
                ));
            }
        }
        violations
    }

    /// C: 单次请求册数上限
    pub fn check_request_size(requested: usize, max_per_request: i32) -> Option<PolicyViolation> {
        if requested as i64 > max_per_request as i64 {
            Some(PolicyViolation::new(
                PolicyRule::RequestSize,
                format!("单次请求 {} 册，超过上限 {} 册", requested, max_per_request),
            ))
        } else {
            None
        }
    }

    // ==========================================
    // 额度
    // ==========================================

    /// NMC / PER: 周期内已借 + 本次请求 <= 上限
    pub fn check_period_quota(
        loans_in_period: usize,
        requested: usize,
        max_per_period: i32,
        period_days: i32,
    ) -> Option<PolicyViolation> {
        let total = loans_in_period + requested;
        if total as i64 > max_per_period as i64 {
            Some(PolicyViolation::new(
                PolicyRule::PeriodQuota,
                format!(
                    "最近 {} 天已借 {} 册，本次 {} 册，超过周期上限 {} 册",
                    period_days, loans_in_period, requested, max_per_period
                ),
            ))
        } else {
            None
        }
    }

    /// NCZ: 当日已借 + 本次请求 <= 每日上限（daily_limit 为 None 时不限）
    pub fn check_daily_quota(
        loans_today: usize,
        requested: usize,
        daily_limit: Option<i32>,
    ) -> Option<PolicyViolation> {
        let limit = daily_limit?;
        let total = loans_today + requested;
        if total as i64 > limit as i64 {
            Some(PolicyViolation::new(
                PolicyRule::DailyQuota,
                format!(
                    "今日已借 {} 册，本次 {} 册，超过每日上限 {} 册",
                    loans_today, requested, limit
                ),
            ))
        } else {
            None
        }
    }

    /// D / L: 每个领域（直接领域及其全部祖先）窗口内借阅数 + 本次请求 <= 上限
    ///
    /// # 规则
    /// - 每本书对同一领域只计 1 次（领域集合先并入祖先再去重）
    /// - 只对本次请求涉及的领域报违规
    ///
    /// # 参数
    /// - history_domains: 窗口内每笔借阅的直接领域
    /// - requested: (book_id, 直接领域)
    pub fn check_domain_quota(
        hierarchy: &DomainHierarchy,
        history_domains: &[Vec<String>],
        requested: &[(String, Vec<String>)],
        max_per_domain: i32,
        window_months: u32,
    ) -> Vec<PolicyViolation> {
        let mut history_count: BTreeMap<String, i64> = BTreeMap::new();
        for domains in history_domains {
            for d in hierarchy.expand_with_ancestors(domains) {
                *history_count.entry(d).or_insert(0) += 1;
            }
        }

        let mut request_count: BTreeMap<String, i64> = BTreeMap::new();
        for (_, domains) in requested {
            for d in hierarchy.expand_with_ancestors(domains) {
                *request_count.entry(d).or_insert(0) += 1;
            }
        }

        let mut violations = Vec::new();
        for (domain_id, req) in &request_count {
            let past = history_count.get(domain_id).copied().unwrap_or(0);
            if past + req > max_per_domain as i64 {
                let name = hierarchy
                    .get(domain_id)
                    .map(|d| d.name.as_str())
                    .unwrap_or(domain_id.as_str());
                violations.push(PolicyViolation::new(
                    PolicyRule::DomainQuota,
                    format!(
                        "领域「{}」最近 {} 个月已借 {} 册，本次 {} 册，超过上限 {} 册",
                        name, window_months, past, req, max_per_domain
                    ),
                ));
            }
        }
        violations
    }

    /// 多样性: 请求册数 >= threshold 时，直接领域并集 >= min_distinct
    pub fn check_domain_diversity(
        requested_domains: &[Vec<String>],
        threshold_books: i32,
        min_distinct: i32,
    ) -> Option<PolicyViolation> {
        if (requested_domains.len() as i64) < threshold_books as i64 {
            return None;
        }
        let distinct: BTreeSet<&str> = requested_domains
            .iter()
            .flat_map(|ds| ds.iter().map(|d| d.as_str()))
            .collect();
        if (distinct.len() as i64) < min_distinct as i64 {
            Some(PolicyViolation::new(
                PolicyRule::DomainDiversity,
                format!(
                    "请求 {} 册仅覆盖 {} 个领域，至少需要 {} 个不同领域",
                    requested_domains.len(),
                    distinct.len(),
                    min_distinct
                ),
            ))
        } else {
            None
        }
    }

    // ==========================================
    // 单本书
    // ==========================================

    /// DELTA: 同一读者两次借阅同一本书的最小间隔
    ///
    /// # 规则
    /// - (today - last_borrowed_on) < min_days → 拒绝
    pub fn check_reborrow_interval(
        book_id: &str,
        last_borrowed_on: Option<NaiveDate>,
        today: NaiveDate,
        min_days: i32,
    ) -> Option<PolicyViolation> {
        let last = last_borrowed_on?;
        let elapsed = today.signed_duration_since(last).num_days();
        if elapsed < min_days as i64 {
            Some(PolicyViolation::for_book(
                PolicyRule::ReborrowInterval,
                book_id,
                format!(
                    "{} 已借过该书，距今 {} 天，需间隔至少 {} 天",
                    last, elapsed, min_days
                ),
            ))
        } else {
            None
        }
    }

    pub fn check_already_borrowed(book_id: &str, holds_active_loan: bool) -> Option<PolicyViolation> {
        if holds_active_loan {
            Some(PolicyViolation::for_book(
                PolicyRule::AlreadyBorrowed,
                book_id,
                "读者已持有该书的未归还借阅",
            ))
        } else {
            None
        }
    }

    /// 可借判定
    ///
    /// # 规则
    /// 1. lendable == 0 → READING_ROOM_ONLY
    /// 2. available < 1 → AVAILABILITY_THRESHOLD
    /// 3. available < total × ratio → AVAILABILITY_THRESHOLD
    pub fn check_availability(
        availability: &BookAvailability,
        threshold_ratio: f64,
    ) -> Option<PolicyViolation> {
        let book_id = availability.book_id.as_str();
        if availability.lendable_copies <= 0 {
            return Some(PolicyViolation::for_book(
                PolicyRule::ReadingRoomOnly,
                book_id,
                "该书全部副本仅限阅览室",
            ));
        }
        if availability.available_copies < 1 {
            return Some(PolicyViolation::for_book(
                PolicyRule::AvailabilityThreshold,
                book_id,
                format!(
                    "可外借 {} 册已全部借出",
                    availability.lendable_copies
                ),
            ));
        }
        let floor = availability.total_copies as f64 * threshold_ratio;
        if (availability.available_copies as f64) < floor {
            return Some(PolicyViolation::for_book(
                PolicyRule::AvailabilityThreshold,
                book_id,
                format!(
                    "剩余可借 {} 册，低于馆藏 {} 册的 {:.0}%",
                    availability.available_copies,
                    availability.total_copies,
                    threshold_ratio * 100.0
                ),
            ));
        }
        None
    }

    // ==========================================
    // 经办人
    // ==========================================

    /// PERSIMP: 经办人须为馆员，不得为自己办理，当日经办量不超上限
    pub fn check_lender(
        reader_id: &str,
        lender: Option<&Reader>,
        lender_lent_today: usize,
        requested: usize,
        max_served_per_day: i32,
    ) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        let lender = match lender {
            Some(l) => l,
            None => return violations,
        };

        if !lender.is_staff {
            violations.push(PolicyViolation::new(
                PolicyRule::LenderNotStaff,
                format!("经办人 {} 不是馆员", lender.reader_id),
            ));
        }
        if lender.reader_id == reader_id {
            violations.push(PolicyViolation::new(
                PolicyRule::SelfLending,
                "馆员不得为自己办理借阅",
            ));
        }
        let total = lender_lent_today + requested;
        if total as i64 > max_served_per_day as i64 {
            violations.push(PolicyViolation::new(
                PolicyRule::LenderDailyQuota,
                format!(
                    "经办人今日已办理 {} 册，本次 {} 册，超过每日上限 {} 册",
                    lender_lent_today, requested, max_served_per_day
                ),
            ));
        }
        violations
    }

    // ==========================================
    // 续借
    // ==========================================

    /// LIM: 借阅须未归还；窗口内累计续借天数 + 本次 <= 上限
    pub fn check_extension(
        borrowing: &Borrowing,
        extension_days_in_window: i32,
        requested_days: i32,
        max_extension_days: i32,
        window_months: u32,
    ) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        if !borrowing.is_active {
            violations.push(PolicyViolation::for_book(
                PolicyRule::BorrowingNotActive,
                &borrowing.book_id,
                format!("借阅 {} 已归还，不能续借", borrowing.borrowing_id),
            ));
        }
        let total = extension_days_in_window as i64 + requested_days as i64;
        if total > max_extension_days as i64 {
            violations.push(PolicyViolation::for_book(
                PolicyRule::ExtensionLimit,
                &borrowing.book_id,
                format!(
                    "最近 {} 个月已续借 {} 天，本次 {} 天，超过上限 {} 天",
                    window_months, extension_days_in_window, requested_days, max_extension_days
                ),
            ));
        }
        violations
    }
}
