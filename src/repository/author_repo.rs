// ==========================================
// 图书馆借阅管理系统 - 作者数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::author::Author;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

/// 职责: 管理 author 表的 CRUD 操作
pub struct AuthorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuthorRepository {
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

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Author> {
        Ok(Author {
            author_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
        })
    }

    /// 在给定连接（或事务）上写入作者
    pub(crate) fn insert_with(conn: &Connection, author: &Author) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO author (author_id, first_name, last_name) VALUES (?1, ?2, ?3)",
            params![author.author_id, author.first_name, author.last_name],
        )
    }

    pub fn insert(&self, author: &Author) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_with(&conn, author)?;
        Ok(())
    }

    pub fn find_by_id(&self, author_id: &str) -> RepositoryResult<Option<Author>> {
        let conn = self.get_conn()?;
        let author = conn
            .query_row(
                "SELECT author_id, first_name, last_name FROM author WHERE author_id = ?1",
                params![author_id],
                Self::map_row,
            )
            .optional()?;
        Ok(author)
    }

    /// 按姓名查询（忽略大小写，同名时返回最早登记的一条）
    pub fn find_by_name(&self, first_name: &str, last_name: &str) -> RepositoryResult<Option<Author>> {
        let conn = self.get_conn()?;
        let author = conn
            .query_row(
                r#"
                SELECT author_id, first_name, last_name
                FROM author
                WHERE lower(first_name) = lower(?1) AND lower(last_name) = lower(?2)
                ORDER BY rowid ASC
                LIMIT 1
                "#,
                params![first_name.trim(), last_name.trim()],
                Self::map_row,
            )
            .optional()?;
        Ok(author)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Author>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT author_id, first_name, last_name FROM author ORDER BY last_name, first_name",
        )?;
        let authors = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(authors)
    }

    pub fn update(&self, author: &Author) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE author SET first_name = ?2, last_name = ?3 WHERE author_id = ?1",
            params![author.author_id, author.first_name, author.last_name],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Author".to_string(),
                id: author.author_id.clone(),
            });
        }
        Ok(())
    }

    pub fn delete(&self, author_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM author WHERE author_id = ?1", params![author_id])?;
        Ok(affected)
    }
}
