// ==========================================
// 图书馆借阅管理系统 - 续借引擎
// ==========================================
// 红线: 滚动窗口内累计续借天数不得超过上限
// ==========================================
// 职责: 续借判定 + 生成续借后的借阅与续借记录
// ==========================================

use crate::config::PolicyConfigReader;
use crate::domain::borrowing::{Borrowing, LoanExtension};
use crate::domain::policy::BorrowingDecision;
use crate::domain::reader::Reader;
use crate::engine::BorrowingRulesCore;
use chrono::NaiveDate;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

pub struct ExtensionEngine<C>
where
    C: PolicyConfigReader,
{
    config: Arc<C>,
}

impl<C> ExtensionEngine<C>
where
    C: PolicyConfigReader,
{
    pub fn new(config: Arc<C>) -> Self {
        Self { config }
    }

    /// 续借统计窗口起点
    pub async fn window_start(&self, today: NaiveDate) -> Result<NaiveDate, Box<dyn Error>> {
        let months = self.config.get_extension_window_months().await?;
        Ok(BorrowingRulesCore::month_window_start(today, months))
    }

    /// 评估续借请求
    ///
    /// # 参数
    /// - reader: 借阅人（决定是否按馆员口径）
    /// - borrowing: 被续借的借阅
    /// - recent_extensions: 该读者的续借记录（窗口外的记录会被忽略）
    /// - days: 本次续借天数
    /// - today: 申请日期
    #[instrument(skip(self, reader, borrowing, recent_extensions), fields(borrowing_id = %borrowing.borrowing_id))]
    pub async fn evaluate(
        &self,
        reader: &Reader,
        borrowing: &Borrowing,
        recent_extensions: &[LoanExtension],
        days: i32,
        today: NaiveDate,
    ) -> Result<BorrowingDecision, Box<dyn Error>> {
        let policy = self.config.load_policy().await?;
        let (effective, _) = policy.effective_for(reader.is_staff);

        let start = BorrowingRulesCore::month_window_start(today, effective.extension_window_months);
        let used: i32 = recent_extensions
            .iter()
            .filter(|e| e.reader_id == reader.reader_id)
            .filter(|e| e.requested_on >= start && e.requested_on <= today)
            .map(|e| e.days)
            .sum();

        let violations = BorrowingRulesCore::check_extension(
            borrowing,
            used,
            days,
            effective.max_extension_days,
            effective.extension_window_months,
        );
        debug!(used, days, limit = effective.max_extension_days, "续借评估完成");
        Ok(BorrowingDecision::from_violations(violations))
    }

    /// 生成续借后的借阅与续借记录（不落库）
    ///
    /// # 规则
    /// - new_due_date = due_date + days（晚于 9999-12-31 时取 9999-12-31）
    /// - extension_count + 1, total_extension_days + days
    pub fn apply(&self, borrowing: &Borrowing, days: i32, today: NaiveDate) -> (Borrowing, LoanExtension) {
        let new_due = BorrowingRulesCore::add_days_capped(borrowing.due_date, days);

        let mut updated = borrowing.clone();
        updated.due_date = new_due;
        updated.extension_count = updated.extension_count.saturating_add(1);
        updated.total_extension_days = updated.total_extension_days.saturating_add(days);

        let extension = LoanExtension {
            extension_id: Uuid::new_v4().to_string(),
            borrowing_id: borrowing.borrowing_id.clone(),
            reader_id: borrowing.reader_id.clone(),
            requested_on: today,
            days,
            previous_due_date: borrowing.due_date,
            new_due_date: new_due,
        };
        (updated, extension)
    }
}
