// ==========================================
// 图书馆借阅管理系统 - 读者数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::reader::Reader;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const READER_COLUMNS: &str =
    "reader_id, first_name, last_name, email, phone, address, is_staff, registered_on";

// ==========================================
// ReaderRepository - 读者仓储
// ==========================================
/// 职责: 管理 reader 表的 CRUD 操作
pub struct ReaderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReaderRepository {
    /// 打开数据库文件创建仓储实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Reader> {
        Ok(Reader {
            reader_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            address: row.get(5)?,
            is_staff: row.get::<_, i32>(6)? != 0,
            registered_on: row.get(7)?,
        })
    }

    /// 新增读者
    pub fn insert(&self, reader: &Reader) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO reader (
                reader_id, first_name, last_name, email, phone, address, is_staff, registered_on
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                reader.reader_id,
                reader.first_name,
                reader.last_name,
                reader.email,
                reader.phone,
                reader.address,
                reader.is_staff as i32,
                reader.registered_on,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询
    ///
    /// # 返回
    /// - Ok(Some(Reader)): 找到读者
    /// - Ok(None): 未找到
    pub fn find_by_id(&self, reader_id: &str) -> RepositoryResult<Option<Reader>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM reader WHERE reader_id = ?1", READER_COLUMNS);
        let reader = conn
            .query_row(&sql, params![reader_id], Self::map_row)
            .optional()?;
        Ok(reader)
    }

    /// 按邮箱查询（忽略大小写）
    pub fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Reader>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM reader WHERE lower(email) = lower(?1)",
            READER_COLUMNS
        );
        let reader = conn
            .query_row(&sql, params![email.trim()], Self::map_row)
            .optional()?;
        Ok(reader)
    }

    /// 查询全部读者（按姓、名排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Reader>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM reader ORDER BY last_name ASC, first_name ASC",
            READER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let readers = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(readers)
    }

    /// 更新读者
    ///
    /// # 返回
    /// - Err(NotFound): 读者不存在
    pub fn update(&self, reader: &Reader) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE reader
            SET first_name = ?2, last_name = ?3, email = ?4, phone = ?5,
                address = ?6, is_staff = ?7, registered_on = ?8
            WHERE reader_id = ?1
            "#,
            params![
                reader.reader_id,
                reader.first_name,
                reader.last_name,
                reader.email,
                reader.phone,
                reader.address,
                reader.is_staff as i32,
                reader.registered_on,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Reader".to_string(),
                id: reader.reader_id.clone(),
            });
        }
        Ok(())
    }

    /// 删除读者
    ///
    /// # 返回
    /// - 删除的行数
    pub fn delete(&self, reader_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM reader WHERE reader_id = ?1", params![reader_id])?;
        Ok(affected)
    }
}
