// ==========================================
// 图书馆借阅管理系统 - 借阅业务 API
// ==========================================
// 职责: 借阅准入预检、借出、归还、续借、借阅查询
// 红线: 一次借阅请求要么全部借出，要么全部拒绝
// 红线: 拒绝必须携带全部政策违规
// 约束: 同一实例内借出/续借串行执行；写事务内复核在借数
// ==========================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{config_error, ApiError, ApiResult};
use crate::config::PolicyConfigReader;
use crate::domain::borrowing::{Borrowing, LoanExtension};
use crate::domain::policy::BorrowingDecision;
use crate::domain::reader::Reader;
use crate::engine::{
    BorrowingContext, BorrowingEligibilityEngine, BorrowingHistoryEntry, BorrowingRulesCore,
    DomainHierarchy, ExtensionEngine, RequestedBook,
};
use crate::repository::book_repo::BookRepository;
use crate::repository::borrowing_repo::BorrowingRepository;
use crate::repository::domain_repo::BookDomainRepository;
use crate::repository::edition_repo::EditionRepository;
use crate::repository::reader_repo::ReaderRepository;
use crate::validation::validate_extension_days;

/// 借阅请求中的一项：图书，可选指定版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowItem {
    pub book_id: String,
    pub edition_id: Option<String>,
}

impl BorrowItem {
    pub fn book(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            edition_id: None,
        }
    }

    pub fn edition(book_id: impl Into<String>, edition_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            edition_id: Some(edition_id.into()),
        }
    }
}

// ==========================================
// BorrowingApi - 借阅业务 API
// ==========================================
pub struct BorrowingApi<C>
where
    C: PolicyConfigReader,
{
    config: Arc<C>,
    eligibility: BorrowingEligibilityEngine<C>,
    extension: ExtensionEngine<C>,
    reader_repo: Arc<ReaderRepository>,
    book_repo: Arc<BookRepository>,
    edition_repo: Arc<EditionRepository>,
    domain_repo: Arc<BookDomainRepository>,
    borrowing_repo: Arc<BorrowingRepository>,
    // 准入评估到写入期间持有
    write_lock: Mutex<()>,
}

impl<C> BorrowingApi<C>
where
    C: PolicyConfigReader,
{
    pub fn new(
        config: Arc<C>,
        reader_repo: Arc<ReaderRepository>,
        book_repo: Arc<BookRepository>,
        edition_repo: Arc<EditionRepository>,
        domain_repo: Arc<BookDomainRepository>,
        borrowing_repo: Arc<BorrowingRepository>,
    ) -> Self {
        Self {
            eligibility: BorrowingEligibilityEngine::new(config.clone()),
            extension: ExtensionEngine::new(config.clone()),
            config,
            reader_repo,
            book_repo,
            edition_repo,
            domain_repo,
            borrowing_repo,
            write_lock: Mutex::new(()),
        }
    }

    fn get_reader(&self, reader_id: &str) -> ApiResult<Reader> {
        self.reader_repo
            .find_by_id(reader_id)?
            .ok_or_else(|| ApiError::not_found("Reader", reader_id))
    }

    fn get_borrowing(&self, borrowing_id: &str) -> ApiResult<Borrowing> {
        self.borrowing_repo
            .find_by_id(borrowing_id)?
            .ok_or_else(|| ApiError::not_found("Borrowing", borrowing_id))
    }

    /// 组装借阅请求对象图
    ///
    /// # 步骤
    /// 1. 读者、请求图书、经办人（不存在即 NotFound）
    /// 2. 读者窗口内借阅 + 全部未归还借阅，附带各书直接领域
    /// 3. 经办人当日经办量、领域层级
    async fn build_context(
        &self,
        reader_id: &str,
        book_ids: &[String],
        lender_id: Option<&str>,
        today: NaiveDate,
    ) -> ApiResult<BorrowingContext> {
        let reader = self.get_reader(reader_id)?;

        let mut requested = Vec::with_capacity(book_ids.len());
        for book_id in book_ids {
            let book = self
                .book_repo
                .find_by_id(book_id)?
                .ok_or_else(|| ApiError::not_found("Book", book_id))?;
            let active_loans = self.borrowing_repo.count_active_by_book(book_id)?;
            requested.push(RequestedBook { book, active_loans });
        }

        let lender = match lender_id {
            Some(id) => Some(self.get_reader(id)?),
            None => None,
        };
        let lender_lent_today = match &lender {
            Some(l) => self.borrowing_repo.count_lent_by_on(&l.reader_id, today)? as usize,
            None => 0,
        };

        let since = self
            .eligibility
            .history_window_start(reader.is_staff, today)
            .await
            .map_err(config_error)?;
        let mut seen = HashSet::new();
        let mut loans = Vec::new();
        for b in self
            .borrowing_repo
            .find_by_reader_since(reader_id, since)?
            .into_iter()
            .chain(self.borrowing_repo.find_active_by_reader(reader_id)?)
        {
            if seen.insert(b.borrowing_id.clone()) {
                loans.push(b);
            }
        }

        let mut domain_cache: HashMap<String, Vec<String>> = HashMap::new();
        for r in &requested {
            domain_cache.insert(r.book.book_id.clone(), r.book.domain_ids.clone());
        }
        let mut history = Vec::with_capacity(loans.len());
        for borrowing in loans {
            if !domain_cache.contains_key(&borrowing.book_id) {
                let domains = self
                    .book_repo
                    .find_by_id(&borrowing.book_id)?
                    .map(|b| b.domain_ids)
                    .unwrap_or_default();
                domain_cache.insert(borrowing.book_id.clone(), domains);
            }
            let domain_ids = domain_cache
                .get(&borrowing.book_id)
                .cloned()
                .unwrap_or_default();
            history.push(BorrowingHistoryEntry {
                borrowing,
                domain_ids,
            });
        }

        let hierarchy = DomainHierarchy::new(self.domain_repo.list_all()?);

        Ok(BorrowingContext {
            reader,
            requested,
            history,
            lender,
            lender_lent_today,
            hierarchy,
        })
    }

    /// 借阅准入预检（不落库）
    pub async fn check_eligibility(
        &self,
        reader_id: &str,
        book_ids: &[String],
        lender_id: Option<&str>,
        today: NaiveDate,
    ) -> ApiResult<BorrowingDecision> {
        let ctx = self.build_context(reader_id, book_ids, lender_id, today).await?;
        self.eligibility
            .evaluate(&ctx, today)
            .await
            .map_err(config_error)
    }

    /// 指定的版本必须存在且属于对应图书
    fn check_editions(&self, items: &[BorrowItem]) -> ApiResult<()> {
        for item in items {
            let Some(edition_id) = &item.edition_id else {
                continue;
            };
            let edition = self
                .edition_repo
                .find_by_id(edition_id)?
                .ok_or_else(|| ApiError::not_found("Edition", edition_id))?;
            if edition.book_id != item.book_id {
                return Err(ApiError::InvalidInput(format!(
                    "版本 {} 属于图书 {}，不属于图书 {}",
                    edition_id, edition.book_id, item.book_id
                )));
            }
        }
        Ok(())
    }

    /// 借出图书（不指定版本）
    pub async fn borrow_books(
        &self,
        reader_id: &str,
        book_ids: &[String],
        lender_id: Option<&str>,
        today: NaiveDate,
    ) -> ApiResult<Vec<Borrowing>> {
        let items: Vec<BorrowItem> = book_ids.iter().map(BorrowItem::book).collect();
        self.borrow_items(reader_id, &items, lender_id, today).await
    }

    /// 借出图书（可逐本指定版本）
    ///
    /// # 返回
    /// - Ok(Vec<Borrowing>): 新建的借阅（单事务写入）
    /// - Err(NotFound / InvalidInput): 版本不存在或不属于该书
    /// - Err(PolicyViolation): 任一政策违规，全部不借出
    /// - Err(OptimisticLockFailure): 评估后在借数被其他连接改变，全部不借出
    #[instrument(skip(self, items), fields(books = items.len()))]
    pub async fn borrow_items(
        &self,
        reader_id: &str,
        items: &[BorrowItem],
        lender_id: Option<&str>,
        today: NaiveDate,
    ) -> ApiResult<Vec<Borrowing>> {
        let _guard = self.write_lock.lock().await;

        let book_ids: Vec<String> = items.iter().map(|i| i.book_id.clone()).collect();
        let ctx = self.build_context(reader_id, &book_ids, lender_id, today).await?;
        self.check_editions(items)?;

        let decision = self
            .eligibility
            .evaluate(&ctx, today)
            .await
            .map_err(config_error)?;
        if !decision.approved {
            warn!(reader_id, violations = decision.violations.len(), "借阅被拒绝: {}", decision.summary());
            return Err(ApiError::policy(decision.violations));
        }

        let loan_days = self.config.get_loan_days().await.map_err(config_error)?;
        let due_date = BorrowingRulesCore::compute_due_date(today, loan_days);
        let borrowings: Vec<Borrowing> = items
            .iter()
            .map(|item| Borrowing {
                borrowing_id: Uuid::new_v4().to_string(),
                reader_id: reader_id.to_string(),
                book_id: item.book_id.clone(),
                edition_id: item.edition_id.clone(),
                lent_by: lender_id.map(|l| l.to_string()),
                borrowed_on: today,
                due_date,
                returned_on: None,
                is_active: true,
                extension_count: 0,
                total_extension_days: 0,
            })
            .collect();

        let expected_active: HashMap<String, i32> = ctx
            .requested
            .iter()
            .map(|r| (r.book.book_id.clone(), r.active_loans))
            .collect();
        let inserted = self
            .borrowing_repo
            .insert_batch_checked(&borrowings, &expected_active)?;
        info!(reader_id, inserted, %due_date, "借阅成功");
        Ok(borrowings)
    }

    /// 归还图书
    ///
    /// # 返回
    /// - Err(InvalidStateTransition): 已归还
    /// - Err(InvalidInput): 归还日期早于借出日期
    pub fn return_book(&self, borrowing_id: &str, today: NaiveDate) -> ApiResult<Borrowing> {
        let borrowing = self.get_borrowing(borrowing_id)?;
        if !borrowing.is_active {
            warn!(borrowing_id, "拒绝归还: 借阅已归还");
            return Err(ApiError::InvalidStateTransition {
                from: "RETURNED".to_string(),
                to: "RETURNED".to_string(),
            });
        }
        if today < borrowing.borrowed_on {
            return Err(ApiError::InvalidInput(format!(
                "归还日期 {} 早于借出日期 {}",
                today, borrowing.borrowed_on
            )));
        }

        if self.borrowing_repo.mark_returned(borrowing_id, today)? == 0 {
            return Err(ApiError::InvalidStateTransition {
                from: "RETURNED".to_string(),
                to: "RETURNED".to_string(),
            });
        }

        let overdue_days = borrowing.overdue_days(today);
        info!(borrowing_id, overdue_days, "图书已归还");
        Ok(Borrowing {
            is_active: false,
            returned_on: Some(today),
            ..borrowing
        })
    }

    /// 续借
    ///
    /// # 返回
    /// - Ok(LoanExtension): 续借记录（借阅到期日同步更新）
    /// - Err(ValidationFailed): days < 1
    /// - Err(PolicyViolation): 已归还或超出续借上限
    #[instrument(skip(self))]
    pub async fn extend_borrowing(
        &self,
        borrowing_id: &str,
        days: i32,
        today: NaiveDate,
    ) -> ApiResult<LoanExtension> {
        validate_extension_days(days)
            .into_result()
            .map_err(ApiError::validation)?;

        let _guard = self.write_lock.lock().await;
        let borrowing = self.get_borrowing(borrowing_id)?;
        let reader = self.get_reader(&borrowing.reader_id)?;

        let since = self.extension.window_start(today).await.map_err(config_error)?;
        let recent = self
            .borrowing_repo
            .find_extensions_by_reader_since(&reader.reader_id, since)?;

        let decision = self
            .extension
            .evaluate(&reader, &borrowing, &recent, days, today)
            .await
            .map_err(config_error)?;
        if !decision.approved {
            warn!(borrowing_id, "续借被拒绝: {}", decision.summary());
            return Err(ApiError::policy(decision.violations));
        }

        let (updated, extension) = self.extension.apply(&borrowing, days, today);
        self.borrowing_repo.apply_extension(&updated, &extension)?;
        info!(
            borrowing_id,
            days,
            new_due_date = %extension.new_due_date,
            "续借成功"
        );
        Ok(extension)
    }

    pub fn list_active_borrowings(&self, reader_id: &str) -> ApiResult<Vec<Borrowing>> {
        self.get_reader(reader_id)?;
        Ok(self.borrowing_repo.find_active_by_reader(reader_id)?)
    }

    /// 读者全部借阅历史（最近的在前）
    pub fn list_reader_history(&self, reader_id: &str) -> ApiResult<Vec<Borrowing>> {
        self.get_reader(reader_id)?;
        Ok(self.borrowing_repo.find_by_reader(reader_id)?)
    }

    pub fn list_overdue(&self, today: NaiveDate) -> ApiResult<Vec<Borrowing>> {
        Ok(self.borrowing_repo.find_overdue(today)?)
    }

    pub fn list_extensions(&self, borrowing_id: &str) -> ApiResult<Vec<LoanExtension>> {
        self.get_borrowing(borrowing_id)?;
        Ok(self.borrowing_repo.find_extensions_by_borrowing(borrowing_id)?)
    }
}
