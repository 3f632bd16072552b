// ==========================================
// 图书馆借阅管理系统 - 版本数据仓储
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::book::Edition;
use crate::domain::types::BookType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct EditionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EditionRepository {
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

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Edition> {
        let raw_type: String = row.get(5)?;
        let book_type = BookType::from_str(&raw_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("未知装帧类型: {}", raw_type).into(),
            )
        })?;

        Ok(Edition {
            edition_id: row.get(0)?,
            book_id: row.get(1)?,
            publisher: row.get(2)?,
            publication_year: row.get(3)?,
            page_count: row.get(4)?,
            book_type,
        })
    }

    pub fn insert(&self, edition: &Edition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_with(&conn, edition)?;
        Ok(())
    }

    /// 在给定连接（或事务）上写入版本
    pub(crate) fn insert_with(conn: &Connection, edition: &Edition) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            INSERT INTO edition (
                edition_id, book_id, publisher, publication_year, page_count, book_type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                edition.edition_id,
                edition.book_id,
                edition.publisher,
                edition.publication_year,
                edition.page_count,
                edition.book_type.to_db_str(),
            ],
        )
    }

    pub fn find_by_id(&self, edition_id: &str) -> RepositoryResult<Option<Edition>> {
        let conn = self.get_conn()?;
        let edition = conn
            .query_row(
                r#"
                SELECT edition_id, book_id, publisher, publication_year, page_count, book_type
                FROM edition WHERE edition_id = ?1
                "#,
                params![edition_id],
                Self::map_row,
            )
            .optional()?;
        Ok(edition)
    }

    /// 查询图书的全部版本（按出版年份倒序）
    pub fn find_by_book(&self, book_id: &str) -> RepositoryResult<Vec<Edition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT edition_id, book_id, publisher, publication_year, page_count, book_type
            FROM edition
            WHERE book_id = ?1
            ORDER BY publication_year DESC, edition_id ASC
            "#,
        )?;
        let editions = stmt
            .query_map(params![book_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(editions)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Edition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT edition_id, book_id, publisher, publication_year, page_count, book_type
            FROM edition
            ORDER BY book_id ASC, publication_year DESC
            "#,
        )?;
        let editions = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(editions)
    }

    pub fn update(&self, edition: &Edition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE edition
            SET book_id = ?2, publisher = ?3, publication_year = ?4, page_count = ?5, book_type = ?6
            WHERE edition_id = ?1
            "#,
            params![
                edition.edition_id,
                edition.book_id,
                edition.publisher,
                edition.publication_year,
                edition.page_count,
                edition.book_type.to_db_str(),
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Edition".to_string(),
                id: edition.edition_id.clone(),
            });
        }
        Ok(())
    }

    pub fn delete(&self, edition_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected =
            conn.execute("DELETE FROM edition WHERE edition_id = ?1", params![edition_id])?;
        Ok(affected)
    }
}
