// ==========================================
// 图书馆借阅管理系统 - 馆藏导入模块
// ==========================================
// 职责: CSV 文件 → 作者/图书/版本
// ==========================================

pub mod catalog_csv;
pub mod csv_parser;
pub mod error;

pub use catalog_csv::{CatalogCsvImporter, CatalogImportReport, FailedRow};
pub use csv_parser::CsvParser;
pub use error::{ImportError, ImportResult};
