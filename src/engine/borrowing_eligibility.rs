// ==========================================
// 图书馆借阅管理系统 - 借阅准入引擎
// ==========================================
// 红线: 不满足政策的借阅请求不得落库
// ==========================================
// 职责: 对一次借阅请求执行全部政策规则，汇总全部违规
// 输入: BorrowingContext（读者、请求图书、借阅历史、经办人、领域层级）
// 输出: BorrowingDecision（approved + violations）
// ==========================================

use crate::config::PolicyConfigReader;
use crate::domain::book::{Book, BookAvailability};
use crate::domain::borrowing::Borrowing;
use crate::domain::policy::{BorrowingDecision, LibraryPolicy, PolicyViolation};
use crate::domain::reader::Reader;
use crate::engine::domain_hierarchy::DomainHierarchy;
use crate::engine::BorrowingRulesCore;
use chrono::NaiveDate;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, instrument};

// ==========================================
// 上下文对象
// ==========================================

/// 请求中的一本书及其当前在借数
#[derive(Debug, Clone)]
pub struct RequestedBook {
    pub book: Book,
    pub active_loans: i32,
}

/// 读者的一笔历史借阅及该书的直接领域
#[derive(Debug, Clone)]
pub struct BorrowingHistoryEntry {
    pub borrowing: Borrowing,
    pub domain_ids: Vec<String>,
}

/// 借阅请求的内存对象图
///
/// history 至少需覆盖 `history_window_start` 之后的借阅以及全部未归还借阅
#[derive(Debug, Clone)]
pub struct BorrowingContext {
    pub reader: Reader,
    pub requested: Vec<RequestedBook>,
    pub history: Vec<BorrowingHistoryEntry>,
    pub lender: Option<Reader>,
    pub lender_lent_today: usize,
    pub hierarchy: DomainHierarchy,
}

// ==========================================
// BorrowingEligibilityEngine - 借阅准入引擎
// ==========================================
// 红线: 不直接写库，只计算和返回判定
pub struct BorrowingEligibilityEngine<C>
where
    C: PolicyConfigReader,
{
    config: Arc<C>,
}

impl<C> BorrowingEligibilityEngine<C>
where
    C: PolicyConfigReader,
{
    pub fn new(config: Arc<C>) -> Self {
        Self { config }
    }

    /// 借阅历史需要回溯到的最早日期（周期窗口与领域窗口取早者）
    pub async fn history_window_start(
        &self,
        is_staff: bool,
        today: NaiveDate,
    ) -> Result<NaiveDate, Box<dyn Error>> {
        let policy = self.config.load_policy().await?;
        let (effective, _) = policy.effective_for(is_staff);
        Ok(Self::window_start(&effective, today))
    }

    fn window_start(policy: &LibraryPolicy, today: NaiveDate) -> NaiveDate {
        let by_days = BorrowingRulesCore::day_window_start(today, policy.period_days);
        let by_domain = BorrowingRulesCore::month_window_start(today, policy.domain_window_months);
        let by_reborrow =
            BorrowingRulesCore::day_window_start(today, policy.min_days_between_same_book);
        by_days.min(by_domain).min(by_reborrow)
    }

    /// 评估一次借阅请求
    ///
    /// # 参数
    /// - ctx: 借阅请求对象图
    /// - today: 借阅日期
    ///
    /// # 返回
    /// - BorrowingDecision: 全部违规（空请求时直接返回）
    #[instrument(skip(self, ctx), fields(reader_id = %ctx.reader.reader_id, requested = ctx.requested.len()))]
    pub async fn evaluate(
        &self,
        ctx: &BorrowingContext,
        today: NaiveDate,
    ) -> Result<BorrowingDecision, Box<dyn Error>> {
        let policy = self.config.load_policy().await?;
        let decision = Self::evaluate_with_policy(&policy, ctx, today);
        debug!(
            approved = decision.approved,
            violations = decision.violations.len(),
            "借阅准入评估完成"
        );
        Ok(decision)
    }

    /// 使用给定政策评估（同步，便于批量场景复用已加载的政策）
    pub fn evaluate_with_policy(
        policy: &LibraryPolicy,
        ctx: &BorrowingContext,
        today: NaiveDate,
    ) -> BorrowingDecision {
        let (effective, daily_limit) = policy.effective_for(ctx.reader.is_staff);
        let requested = ctx.requested.len();

        // === 步骤 1: 请求本身 ===
        if let Some(v) = BorrowingRulesCore::check_empty_request(requested) {
            return BorrowingDecision::from_violations(vec![v]);
        }

        let mut violations: Vec<PolicyViolation> = Vec::new();
        let book_ids: Vec<String> = ctx.requested.iter().map(|r| r.book.book_id.clone()).collect();
        violations.extend(BorrowingRulesCore::check_duplicates(&book_ids));
        violations.extend(BorrowingRulesCore::check_request_size(
            requested,
            effective.max_books_per_request,
        ));

        // === 步骤 2: 周期/每日额度 ===
        let period_start = BorrowingRulesCore::day_window_start(today, effective.period_days);
        let loans_in_period = ctx
            .history
            .iter()
            .filter(|h| h.borrowing.borrowed_on >= period_start && h.borrowing.borrowed_on <= today)
            .count();
        violations.extend(BorrowingRulesCore::check_period_quota(
            loans_in_period,
            requested,
            effective.max_books_per_period,
            effective.period_days,
        ));

        let loans_today = ctx
            .history
            .iter()
            .filter(|h| h.borrowing.borrowed_on == today)
            .count();
        violations.extend(BorrowingRulesCore::check_daily_quota(
            loans_today,
            requested,
            daily_limit,
        ));

        // === 步骤 3: 领域额度与多样性 ===
        let domain_start =
            BorrowingRulesCore::month_window_start(today, effective.domain_window_months);
        let history_domains: Vec<Vec<String>> = ctx
            .history
            .iter()
            .filter(|h| h.borrowing.borrowed_on >= domain_start && h.borrowing.borrowed_on <= today)
            .map(|h| h.domain_ids.clone())
            .collect();
        let requested_domains: Vec<(String, Vec<String>)> = ctx
            .requested
            .iter()
            .map(|r| (r.book.book_id.clone(), r.book.domain_ids.clone()))
            .collect();
        violations.extend(BorrowingRulesCore::check_domain_quota(
            &ctx.hierarchy,
            &history_domains,
            &requested_domains,
            effective.max_books_per_domain,
            effective.domain_window_months,
        ));

        let direct_domains: Vec<Vec<String>> =
            requested_domains.into_iter().map(|(_, ds)| ds).collect();
        violations.extend(BorrowingRulesCore::check_domain_diversity(
            &direct_domains,
            effective.diversity_threshold_books,
            effective.min_distinct_domains,
        ));

        // === 步骤 4: 逐本检查 ===
        let mut checked = std::collections::HashSet::new();
        for req in &ctx.requested {
            let book_id = req.book.book_id.as_str();
            if !checked.insert(book_id) {
                continue;
            }

            let holds_active = ctx
                .history
                .iter()
                .any(|h| h.borrowing.is_active && h.borrowing.book_id == book_id);
            violations.extend(BorrowingRulesCore::check_already_borrowed(
                book_id,
                holds_active,
            ));

            let last_borrowed_on = ctx
                .history
                .iter()
                .filter(|h| h.borrowing.book_id == book_id && h.borrowing.borrowed_on <= today)
                .map(|h| h.borrowing.borrowed_on)
                .max();
            violations.extend(BorrowingRulesCore::check_reborrow_interval(
                book_id,
                last_borrowed_on,
                today,
                effective.min_days_between_same_book,
            ));

            let availability = BookAvailability::from_book(&req.book, req.active_loans);
            violations.extend(BorrowingRulesCore::check_availability(
                &availability,
                effective.availability_threshold_ratio,
            ));
        }

        // === 步骤 5: 经办人 ===
        violations.extend(BorrowingRulesCore::check_lender(
            &ctx.reader.reader_id,
            ctx.lender.as_ref(),
            ctx.lender_lent_today,
            requested,
            policy.max_loans_served_per_day,
        ));

        BorrowingDecision::from_violations(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book_domain::BookDomain;
    use crate::domain::policy::PolicyRule;
    use async_trait::async_trait;

    // 固定政策的配置读取器
    struct FixedPolicy(LibraryPolicy);

    #[async_trait]
    impl PolicyConfigReader for FixedPolicy {
        async fn get_max_books_per_period(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.max_books_per_period)
        }
        async fn get_period_days(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.period_days)
        }
        async fn get_max_books_per_request(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.max_books_per_request)
        }
        async fn get_max_books_per_domain(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.max_books_per_domain)
        }
        async fn get_domain_window_months(&self) -> Result<u32, Box<dyn Error>> {
            Ok(self.0.domain_window_months)
        }
        async fn get_max_extension_days(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.max_extension_days)
        }
        async fn get_extension_window_months(&self) -> Result<u32, Box<dyn Error>> {
            Ok(self.0.extension_window_months)
        }
        async fn get_min_days_between_same_book(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.min_days_between_same_book)
        }
        async fn get_max_books_per_day(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.max_books_per_day)
        }
        async fn get_max_loans_served_per_day(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.max_loans_served_per_day)
        }
        async fn get_diversity_threshold_books(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.diversity_threshold_books)
        }
        async fn get_min_distinct_domains(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.min_distinct_domains)
        }
        async fn get_availability_threshold_ratio(&self) -> Result<f64, Box<dyn Error>> {
            Ok(self.0.availability_threshold_ratio)
        }
        async fn get_loan_days(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.loan_days)
        }
        async fn get_staff_multiplier(&self) -> Result<i32, Box<dyn Error>> {
            Ok(self.0.staff_multiplier)
        }
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn reader(id: &str, is_staff: bool) -> Reader {
        Reader {
            reader_id: id.to_string(),
            first_name: "Ana".to_string(),
            last_name: "Pop".to_string(),
            email: Some("ana@lib.io".to_string()),
            phone: None,
            address: None,
            is_staff,
            registered_on: d(1, 1),
        }
    }

    fn book(id: &str, domains: &[&str]) -> RequestedBook {
        RequestedBook {
            book: Book {
                book_id: id.to_string(),
                title: id.to_string(),
                total_copies: 10,
                reading_room_copies: 0,
                author_ids: vec!["A1".to_string()],
                domain_ids: domains.iter().map(|s| s.to_string()).collect(),
            },
            active_loans: 0,
        }
    }

    fn past(id: &str, book_id: &str, borrowed_on: NaiveDate, domains: &[&str]) -> BorrowingHistoryEntry {
        BorrowingHistoryEntry {
            borrowing: Borrowing {
                borrowing_id: id.to_string(),
                reader_id: "R1".to_string(),
                book_id: book_id.to_string(),
                edition_id: None,
                lent_by: None,
                borrowed_on,
                due_date: borrowed_on + chrono::Duration::days(14),
                returned_on: Some(borrowed_on + chrono::Duration::days(1)),
                is_active: false,
                extension_count: 0,
                total_extension_days: 0,
            },
            domain_ids: domains.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn hierarchy() -> DomainHierarchy {
        let mk = |id: &str, parent: Option<&str>| BookDomain {
            domain_id: id.to_string(),
            name: id.to_string(),
            parent_id: parent.map(|p| p.to_string()),
        };
        DomainHierarchy::new(vec![mk("SCI", None), mk("CS", Some("SCI")), mk("ART", None)])
    }

    fn ctx(reader: Reader, requested: Vec<RequestedBook>) -> BorrowingContext {
        BorrowingContext {
            reader,
            requested,
            history: vec![],
            lender: None,
            lender_lent_today: 0,
            hierarchy: hierarchy(),
        }
    }

    fn engine() -> BorrowingEligibilityEngine<FixedPolicy> {
        BorrowingEligibilityEngine::new(Arc::new(FixedPolicy(LibraryPolicy::default())))
    }

    #[tokio::test]
    async fn test_simple_request_approved() {
        let c = ctx(reader("R1", false), vec![book("B1", &["CS"]), book("B2", &["ART"])]);
        let decision = engine().evaluate(&c, d(3, 10)).await.unwrap();
        assert!(decision.approved, "{}", decision.summary());
    }

    #[tokio::test]
    async fn test_empty_request_short_circuits() {
        let c = ctx(reader("R1", false), vec![]);
        let decision = engine().evaluate(&c, d(3, 10)).await.unwrap();
        assert!(!decision.approved);
        assert_eq!(decision.violations.len(), 1);
        assert!(decision.has_rule(PolicyRule::EmptyRequest));
    }

    #[tokio::test]
    async fn test_collects_all_violations() {
        // 6 本同一领域: 超单次上限、领域额度、多样性
        let books: Vec<RequestedBook> = (1..=6).map(|i| book(&format!("B{}", i), &["CS"])).collect();
        let c = ctx(reader("R1", false), books);
        let decision = engine().evaluate(&c, d(3, 10)).await.unwrap();

        assert!(!decision.approved);
        assert!(decision.has_rule(PolicyRule::RequestSize));
        assert!(decision.has_rule(PolicyRule::DomainQuota));
        assert!(decision.has_rule(PolicyRule::DomainDiversity));
        assert!(decision.has_rule(PolicyRule::DailyQuota));
    }

    #[tokio::test]
    async fn test_staff_doubles_limits() {
        // 6 本跨两个领域: 普通读者超单次上限，馆员 (5×2) 通过
        let books = vec![
            book("B1", &["CS"]),
            book("B2", &["CS"]),
            book("B3", &["CS"]),
            book("B4", &["ART"]),
            book("B5", &["ART"]),
            book("B6", &["ART"]),
        ];
        let regular = engine()
            .evaluate(&ctx(reader("R1", false), books.clone()), d(3, 10))
            .await
            .unwrap();
        assert!(regular.has_rule(PolicyRule::RequestSize));

        let staff = engine()
            .evaluate(&ctx(reader("S1", true), books), d(3, 10))
            .await
            .unwrap();
        assert!(staff.approved, "{}", staff.summary());
    }

    #[tokio::test]
    async fn test_history_drives_quotas() {
        let mut c = ctx(reader("R1", false), vec![book("B1", &["CS"])]);
        c.history = vec![
            past("L1", "B1", d(3, 1), &["CS"]),
            past("L2", "B7", d(3, 2), &["CS"]),
            past("L3", "B8", NaiveDate::from_ymd_opt(2025, 11, 2).unwrap(), &["CS"]), // 超出领域窗口
        ];
        let decision = engine().evaluate(&c, d(3, 10)).await.unwrap();
        // B1 在 9 天前借过
        assert!(decision.has_rule(PolicyRule::ReborrowInterval));
        // CS / SCI 窗口内 2 + 1 = 3，未超
        assert!(!decision.has_rule(PolicyRule::DomainQuota));
    }

    #[tokio::test]
    async fn test_already_holding_and_availability() {
        let mut unavailable = book("B2", &["ART"]);
        unavailable.active_loans = 10;
        let mut c = ctx(reader("R1", false), vec![book("B1", &["CS"]), unavailable]);
        let mut active = past("L1", "B1", d(1, 5), &["CS"]);
        active.borrowing.is_active = true;
        active.borrowing.returned_on = None;
        c.history = vec![active];

        let decision = engine().evaluate(&c, d(3, 10)).await.unwrap();
        assert!(decision.has_rule(PolicyRule::AlreadyBorrowed));
        assert!(decision.has_rule(PolicyRule::AvailabilityThreshold));
        assert!(!decision.has_rule(PolicyRule::ReborrowInterval));
    }

    #[tokio::test]
    async fn test_lender_checks() {
        let mut c = ctx(reader("R1", false), vec![book("B1", &["CS"])]);
        c.lender = Some(reader("R2", false));
        let decision = engine().evaluate(&c, d(3, 10)).await.unwrap();
        assert!(decision.has_rule(PolicyRule::LenderNotStaff));

        c.lender = Some(reader("S1", true));
        c.lender_lent_today = 20;
        let decision = engine().evaluate(&c, d(3, 10)).await.unwrap();
        assert!(decision.has_rule(PolicyRule::LenderDailyQuota));
    }

    #[tokio::test]
    async fn test_history_window_start() {
        // 周期 30 天 → 2-9；领域 3 个月 → 12-10；取早者
        let start = engine().history_window_start(false, d(3, 10)).await.unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 10).unwrap());
    }

    #[tokio::test]
    async fn test_huge_windows_do_not_overflow() {
        let policy = LibraryPolicy {
            period_days: 2_000_000_000,
            min_days_between_same_book: i32::MAX,
            ..LibraryPolicy::default()
        };
        let engine = BorrowingEligibilityEngine::new(Arc::new(FixedPolicy(policy)));

        let start = engine.history_window_start(false, d(3, 10)).await.unwrap();
        assert_eq!(start, BorrowingRulesCore::earliest_date());

        let mut c = ctx(reader("R1", false), vec![book("B1", &["CS"])]);
        c.history = vec![past("L1", "B1", NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(), &["CS"])];
        let decision = engine.evaluate(&c, d(3, 10)).await.unwrap();
        assert!(decision.has_rule(PolicyRule::ReborrowInterval));
    }
}
