// ==========================================
// 图书馆借阅管理系统 - 馆藏管理 API
// ==========================================
// 职责: 作者、图书、版本的维护与查询
// 红线: 图书领域集合不得同时包含祖先与后代
// 红线: 被引用的作者、在借的图书不得删除
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::author::Author;
use crate::domain::book::{Book, BookAvailability, Edition};
use crate::domain::types::BookType;
use crate::engine::DomainHierarchy;
use crate::repository::author_repo::AuthorRepository;
use crate::repository::book_repo::BookRepository;
use crate::repository::borrowing_repo::BorrowingRepository;
use crate::repository::domain_repo::BookDomainRepository;
use crate::repository::edition_repo::EditionRepository;
use crate::validation::{validate_author, validate_book, validate_edition};

// ==========================================
// 输入对象
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorInput {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookInput {
    pub title: String,
    pub total_copies: i32,
    pub reading_room_copies: i32,
    pub author_ids: Vec<String>,
    pub domain_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditionInput {
    pub publisher: String,
    pub publication_year: i32,
    pub page_count: i32,
    pub book_type: BookType,
}

// ==========================================
// CatalogApi - 馆藏管理 API
// ==========================================
pub struct CatalogApi {
    author_repo: Arc<AuthorRepository>,
    book_repo: Arc<BookRepository>,
    edition_repo: Arc<EditionRepository>,
    domain_repo: Arc<BookDomainRepository>,
    borrowing_repo: Arc<BorrowingRepository>,
}

impl CatalogApi {
    pub fn new(
        author_repo: Arc<AuthorRepository>,
        book_repo: Arc<BookRepository>,
        edition_repo: Arc<EditionRepository>,
        domain_repo: Arc<BookDomainRepository>,
        borrowing_repo: Arc<BorrowingRepository>,
    ) -> Self {
        Self {
            author_repo,
            book_repo,
            edition_repo,
            domain_repo,
            borrowing_repo,
        }
    }

    fn load_hierarchy(&self) -> ApiResult<DomainHierarchy> {
        Ok(DomainHierarchy::new(self.domain_repo.list_all()?))
    }

    fn known_author_ids(&self) -> ApiResult<HashSet<String>> {
        Ok(self
            .author_repo
            .list_all()?
            .into_iter()
            .map(|a| a.author_id)
            .collect())
    }

    // ==========================================
    // 作者
    // ==========================================

    pub fn create_author(&self, input: AuthorInput) -> ApiResult<Author> {
        let author = Author {
            author_id: Uuid::new_v4().to_string(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
        };
        validate_author(&author)
            .into_result()
            .map_err(ApiError::validation)?;

        self.author_repo.insert(&author)?;
        info!(author_id = %author.author_id, name = %author.full_name(), "作者已创建");
        Ok(author)
    }

    pub fn get_author(&self, author_id: &str) -> ApiResult<Author> {
        self.author_repo
            .find_by_id(author_id)?
            .ok_or_else(|| ApiError::not_found("Author", author_id))
    }

    pub fn list_authors(&self) -> ApiResult<Vec<Author>> {
        Ok(self.author_repo.list_all()?)
    }

    pub fn update_author(&self, author_id: &str, input: AuthorInput) -> ApiResult<Author> {
        let author = Author {
            author_id: author_id.to_string(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
        };
        validate_author(&author)
            .into_result()
            .map_err(ApiError::validation)?;

        self.author_repo.update(&author)?;
        info!(author_id, "作者已更新");
        Ok(author)
    }

    /// 删除作者
    ///
    /// # 返回
    /// - Err(BusinessRuleViolation): 仍有图书引用该作者
    pub fn delete_author(&self, author_id: &str) -> ApiResult<()> {
        self.get_author(author_id)?;

        let books = self.book_repo.find_by_author(author_id)?;
        if !books.is_empty() {
            warn!(author_id, books = books.len(), "拒绝删除: 作者仍被图书引用");
            return Err(ApiError::BusinessRuleViolation(format!(
                "作者 {} 仍被 {} 本图书引用，不能删除",
                author_id,
                books.len()
            )));
        }

        self.author_repo.delete(author_id)?;
        info!(author_id, "作者已删除");
        Ok(())
    }

    // ==========================================
    // 图书
    // ==========================================

    fn build_book(book_id: String, input: BookInput) -> Book {
        Book {
            book_id,
            title: input.title.trim().to_string(),
            total_copies: input.total_copies,
            reading_room_copies: input.reading_room_copies,
            author_ids: input.author_ids,
            domain_ids: input.domain_ids,
        }
    }

    fn validate_book_refs(&self, book: &Book) -> ApiResult<()> {
        let hierarchy = self.load_hierarchy()?;
        let known_authors = self.known_author_ids()?;
        validate_book(book, &known_authors, &hierarchy)
            .into_result()
            .map_err(ApiError::validation)
    }

    /// 新增图书
    ///
    /// # 校验
    /// - 字段、副本数、作者/领域存在性
    /// - 领域集合不得包含祖先/后代对
    pub fn create_book(&self, input: BookInput) -> ApiResult<Book> {
        let book = Self::build_book(Uuid::new_v4().to_string(), input);
        self.validate_book_refs(&book)?;

        self.book_repo.insert(&book)?;
        info!(
            book_id = %book.book_id,
            title = %book.title,
            domains = book.domain_ids.len(),
            "图书已创建"
        );
        Ok(book)
    }

    pub fn get_book(&self, book_id: &str) -> ApiResult<Book> {
        self.book_repo
            .find_by_id(book_id)?
            .ok_or_else(|| ApiError::not_found("Book", book_id))
    }

    pub fn list_books(&self) -> ApiResult<Vec<Book>> {
        Ok(self.book_repo.list_all()?)
    }

    /// 按领域查询图书
    ///
    /// # 参数
    /// - include_descendants: true 时包含全部后代领域下的图书
    pub fn list_books_by_domain(
        &self,
        domain_id: &str,
        include_descendants: bool,
    ) -> ApiResult<Vec<Book>> {
        let hierarchy = self.load_hierarchy()?;
        if !hierarchy.contains(domain_id) {
            return Err(ApiError::not_found("BookDomain", domain_id));
        }

        if !include_descendants {
            return Ok(self.book_repo.find_by_domain(domain_id)?);
        }

        let mut ids = vec![domain_id.to_string()];
        ids.extend(hierarchy.descendants(domain_id));
        debug!(domain_id, domains = ids.len(), "按领域子树查询图书");
        Ok(self.book_repo.find_by_domains(&ids)?)
    }

    /// 修改图书
    ///
    /// # 规则
    /// - 修改后的可外借副本数不得少于当前在借数
    pub fn update_book(&self, book_id: &str, input: BookInput) -> ApiResult<Book> {
        self.get_book(book_id)?;
        let book = Self::build_book(book_id.to_string(), input);
        self.validate_book_refs(&book)?;

        let active = self.borrowing_repo.count_active_by_book(book_id)?;
        if book.lendable_copies() < active {
            return Err(ApiError::BusinessRuleViolation(format!(
                "可外借副本 {} 少于在借数 {}",
                book.lendable_copies(),
                active
            )));
        }

        self.book_repo.update(&book)?;
        info!(book_id, "图书已更新");
        Ok(book)
    }

    /// 删除图书（版本随之删除）
    ///
    /// # 返回
    /// - Err(BusinessRuleViolation): 存在任何借阅记录（含已归还），
    ///   借阅历史参与周期额度、领域额度、复借间隔和续借上限的统计
    pub fn delete_book(&self, book_id: &str) -> ApiResult<()> {
        self.get_book(book_id)?;

        let active = self.borrowing_repo.count_active_by_book(book_id)?;
        if active > 0 {
            warn!(book_id, active, "拒绝删除: 图书仍有未归还借阅");
            return Err(ApiError::BusinessRuleViolation(format!(
                "图书 {} 仍有 {} 笔未归还借阅，不能删除",
                book_id, active
            )));
        }

        let history = self.borrowing_repo.count_by_book(book_id)?;
        if history > 0 {
            warn!(book_id, history, "拒绝删除: 图书存在借阅历史");
            return Err(ApiError::BusinessRuleViolation(format!(
                "图书 {} 存在 {} 笔借阅历史，不能删除",
                book_id, history
            )));
        }

        self.book_repo.delete(book_id)?;
        info!(book_id, "图书已删除");
        Ok(())
    }

    pub fn book_availability(&self, book_id: &str) -> ApiResult<BookAvailability> {
        let book = self.get_book(book_id)?;
        let active = self.borrowing_repo.count_active_by_book(book_id)?;
        Ok(BookAvailability::from_book(&book, active))
    }

    // ==========================================
    // 版本
    // ==========================================

    fn build_edition(edition_id: String, book_id: &str, input: EditionInput) -> Edition {
        Edition {
            edition_id,
            book_id: book_id.to_string(),
            publisher: input.publisher.trim().to_string(),
            publication_year: input.publication_year,
            page_count: input.page_count,
            book_type: input.book_type,
        }
    }

    /// 新增版本
    ///
    /// # 参数
    /// - today: 用于出版年份上限
    pub fn add_edition(
        &self,
        book_id: &str,
        input: EditionInput,
        today: NaiveDate,
    ) -> ApiResult<Edition> {
        let edition = Self::build_edition(Uuid::new_v4().to_string(), book_id, input);
        let book_exists = self.book_repo.find_by_id(book_id)?.is_some();
        validate_edition(&edition, book_exists, today.year())
            .into_result()
            .map_err(ApiError::validation)?;

        self.edition_repo.insert(&edition)?;
        info!(edition_id = %edition.edition_id, book_id, "版本已创建");
        Ok(edition)
    }

    pub fn list_editions(&self, book_id: &str) -> ApiResult<Vec<Edition>> {
        self.get_book(book_id)?;
        Ok(self.edition_repo.find_by_book(book_id)?)
    }

    pub fn update_edition(
        &self,
        edition_id: &str,
        input: EditionInput,
        today: NaiveDate,
    ) -> ApiResult<Edition> {
        let existing = self
            .edition_repo
            .find_by_id(edition_id)?
            .ok_or_else(|| ApiError::not_found("Edition", edition_id))?;
        let edition = Self::build_edition(existing.edition_id, &existing.book_id, input);
        validate_edition(&edition, true, today.year())
            .into_result()
            .map_err(ApiError::validation)?;

        self.edition_repo.update(&edition)?;
        info!(edition_id, "版本已更新");
        Ok(edition)
    }

    pub fn delete_edition(&self, edition_id: &str) -> ApiResult<()> {
        let affected = self.edition_repo.delete(edition_id)?;
        if affected == 0 {
            return Err(ApiError::not_found("Edition", edition_id));
        }
        info!(edition_id, "版本已删除");
        Ok(())
    }
}
