// ==========================================
// 图书馆借阅管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、借阅政策参数
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod author;
pub mod book;
pub mod book_domain;
pub mod borrowing;
pub mod policy;
pub mod reader;
pub mod types;

// 重导出核心类型
pub use author::Author;
pub use book::{Book, BookAvailability, Edition};
pub use book_domain::{BookDomain, DomainNode};
pub use borrowing::{Borrowing, LoanExtension};
pub use policy::{BorrowingDecision, LibraryPolicy, PolicyRule, PolicyViolation};
pub use reader::Reader;
pub use types::BookType;
