// ==========================================
// 图书馆借阅管理系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod author_repo;
pub mod book_repo;
pub mod borrowing_repo;
pub mod domain_repo;
pub mod edition_repo;
pub mod error;
pub mod reader_repo;

// 重导出核心仓储
pub use author_repo::AuthorRepository;
pub use book_repo::BookRepository;
pub use borrowing_repo::BorrowingRepository;
pub use domain_repo::BookDomainRepository;
pub use edition_repo::EditionRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use reader_repo::ReaderRepository;
