// ==========================================
// 图书馆借阅管理系统 - 学科领域数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑（层级校验在 engine::domain_hierarchy）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::book_domain::BookDomain;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct BookDomainRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BookDomainRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<BookDomain> {
        Ok(BookDomain {
            domain_id: row.get(0)?,
            name: row.get(1)?,
            parent_id: row.get(2)?,
        })
    }

    pub fn insert(&self, domain: &BookDomain) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO book_domain_def (domain_id, name, parent_id) VALUES (?1, ?2, ?3)",
            params![domain.domain_id, domain.name, domain.parent_id],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, domain_id: &str) -> RepositoryResult<Option<BookDomain>> {
        let conn = self.get_conn()?;
        let domain = conn
            .query_row(
                "SELECT domain_id, name, parent_id FROM book_domain_def WHERE domain_id = ?1",
                params![domain_id],
                Self::map_row,
            )
            .optional()?;
        Ok(domain)
    }

    /// 按名称查询（忽略大小写；不同父领域下可能重名，返回全部）
    pub fn find_all_by_name(&self, name: &str) -> RepositoryResult<Vec<BookDomain>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT domain_id, name, parent_id FROM book_domain_def
            WHERE lower(name) = lower(?1)
            ORDER BY rowid ASC
            "#,
        )?;
        let domains = stmt
            .query_map(params![name.trim()], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(domains)
    }

    /// 查询直接子领域；parent_id 为 None 时返回根领域
    pub fn find_children(&self, parent_id: Option<&str>) -> RepositoryResult<Vec<BookDomain>> {
        let conn = self.get_conn()?;
        let mut stmt = match parent_id {
            Some(_) => conn.prepare(
                "SELECT domain_id, name, parent_id FROM book_domain_def WHERE parent_id = ?1 ORDER BY name",
            )?,
            None => conn.prepare(
                "SELECT domain_id, name, parent_id FROM book_domain_def WHERE parent_id IS NULL ORDER BY name",
            )?,
        };
        let domains = match parent_id {
            Some(pid) => stmt.query_map(params![pid], Self::map_row)?,
            None => stmt.query_map([], Self::map_row)?,
        }
        .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(domains)
    }

    /// 查询全部领域（用于构建层级）
    pub fn list_all(&self) -> RepositoryResult<Vec<BookDomain>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT domain_id, name, parent_id FROM book_domain_def ORDER BY name ASC",
        )?;
        let domains = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(domains)
    }

    pub fn update(&self, domain: &BookDomain) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE book_domain_def SET name = ?2, parent_id = ?3 WHERE domain_id = ?1",
            params![domain.domain_id, domain.name, domain.parent_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "BookDomain".to_string(),
                id: domain.domain_id.clone(),
            });
        }
        Ok(())
    }

    pub fn delete(&self, domain_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM book_domain_def WHERE domain_id = ?1",
            params![domain_id],
        )?;
        Ok(affected)
    }
}
