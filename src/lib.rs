// ==========================================
// 图书馆借阅管理系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 借阅业务规则后端（读者/馆藏/分类/借阅/续借）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 校验层 - 实体字段与关联校验
pub mod validation;

// 引擎层 - 借阅政策规则
pub mod engine;

// 导入层 - 馆藏 CSV
pub mod importer;

// 配置层 - 政策参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出常用类型
// ==========================================

pub use domain::{
    Author, Book, BookAvailability, BookDomain, BookType, Borrowing, BorrowingDecision, DomainNode,
    Edition, LibraryPolicy, LoanExtension, PolicyRule, PolicyViolation, Reader,
};

pub use engine::{
    BorrowingContext, BorrowingEligibilityEngine, BorrowingRulesCore, DomainHierarchy,
    ExtensionEngine,
};

pub use config::{ConfigManager, PolicyConfigReader};

pub use api::{ApiError, ApiResult, BorrowingApi, CatalogApi, DomainApi, ReaderApi};

pub use app::{get_default_db_path, LibraryState};

// ==========================================
// 版本信息
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "图书馆借阅管理系统";
