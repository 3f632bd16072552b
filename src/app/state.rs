// ==========================================
// 图书馆借阅管理系统 - 应用状态
// ==========================================
// 职责: 共享连接上组装全部仓储、配置与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{BorrowingApi, CatalogApi, DomainApi, ReaderApi};
use crate::config::ConfigManager;
use crate::db;
use crate::importer::CatalogCsvImporter;
use crate::repository::{
    AuthorRepository, BookDomainRepository, BookRepository, BorrowingRepository,
    EditionRepository, ReaderRepository,
};

/// 应用状态
///
/// 所有仓储共享同一个连接（单写者会话）
pub struct LibraryState {
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub config: Arc<ConfigManager>,

    pub reader_api: Arc<ReaderApi>,
    pub catalog_api: Arc<CatalogApi>,
    pub domain_api: Arc<DomainApi>,
    pub borrowing_api: Arc<BorrowingApi<ConfigManager>>,
    pub catalog_importer: Arc<CatalogCsvImporter>,
}

impl LibraryState {
    /// 打开（必要时创建）数据库并组装应用状态
    pub fn new(db_path: &str) -> Result<Self, String> {
        tracing::info!("初始化LibraryState，数据库路径: {}", db_path);

        let conn = db::open_sqlite_connection(db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        db::init_schema(&conn).map_err(|e| format!("无法初始化数据库结构: {}", e))?;

        let mut state = Self::from_connection(Arc::new(Mutex::new(conn)))?;
        state.db_path = db_path.to_string();
        Ok(state)
    }

    /// 基于已有连接组装（连接需已完成 schema 初始化）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        // ==========================================
        // 初始化Repository层
        // ==========================================
        let reader_repo = Arc::new(ReaderRepository::from_connection(conn.clone()));
        let author_repo = Arc::new(AuthorRepository::from_connection(conn.clone()));
        let book_repo = Arc::new(BookRepository::from_connection(conn.clone()));
        let edition_repo = Arc::new(EditionRepository::from_connection(conn.clone()));
        let domain_repo = Arc::new(BookDomainRepository::from_connection(conn.clone()));
        let borrowing_repo = Arc::new(BorrowingRepository::from_connection(conn.clone()));

        // ==========================================
        // 配置
        // ==========================================
        let config = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let reader_api = Arc::new(ReaderApi::new(reader_repo.clone(), borrowing_repo.clone()));
        let catalog_api = Arc::new(CatalogApi::new(
            author_repo.clone(),
            book_repo.clone(),
            edition_repo.clone(),
            domain_repo.clone(),
            borrowing_repo.clone(),
        ));
        let domain_api = Arc::new(DomainApi::new(domain_repo.clone(), book_repo.clone()));
        let borrowing_api = Arc::new(BorrowingApi::new(
            config.clone(),
            reader_repo,
            book_repo.clone(),
            edition_repo,
            domain_repo.clone(),
            borrowing_repo,
        ));
        let catalog_importer = Arc::new(CatalogCsvImporter::new(
            author_repo,
            book_repo,
            domain_repo,
        ));

        Ok(Self {
            db_path: String::new(),
            conn,
            config,
            reader_api,
            catalog_api,
            domain_api,
            borrowing_api,
            catalog_importer,
        })
    }
}

/// 默认数据库路径
///
/// # 优先级
/// 1. 环境变量 LIBRARY_DB_PATH
/// 2. 用户数据目录 / library-core / library.db
/// 3. ./library.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("LIBRARY_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./library.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("library-core");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("library.db");
        }
    }
    path.to_string_lossy().to_string()
}
