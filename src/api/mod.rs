// ==========================================
// 图书馆借阅管理系统 - API 层
// ==========================================
// 职责: 编排仓储、校验与引擎，提供业务服务接口
// ==========================================

pub mod borrowing_api;
pub mod catalog_api;
pub mod domain_api;
pub mod error;
pub mod reader_api;

// 重导出核心类型
pub use borrowing_api::{BorrowItem, BorrowingApi};
pub use catalog_api::{AuthorInput, BookInput, CatalogApi, EditionInput};
pub use domain_api::DomainApi;
pub use error::{ApiError, ApiResult};
pub use reader_api::{ReaderApi, ReaderInput};
