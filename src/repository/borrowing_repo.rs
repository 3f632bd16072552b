// ==========================================
// 图书馆借阅管理系统 - 借阅数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 批量借出、续借在同一事务内完成
// 约束: 批量借出在写事务内复核在借数（乐观锁）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::borrowing::{Borrowing, LoanExtension};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

const BORROWING_COLUMNS: &str = r#"
    borrowing_id, reader_id, book_id, edition_id, lent_by,
    borrowed_on, due_date, returned_on, is_active,
    extension_count, total_extension_days
"#;

const EXTENSION_COLUMNS: &str = r#"
    extension_id, borrowing_id, reader_id, requested_on, days,
    previous_due_date, new_due_date
"#;

// ==========================================
// BorrowingRepository - 借阅仓储
// ==========================================
/// 职责: 管理 borrowing / loan_extension 表
pub struct BorrowingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BorrowingRepository {
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

    fn map_borrowing(row: &Row<'_>) -> rusqlite::Result<Borrowing> {
        Ok(Borrowing {
            borrowing_id: row.get(0)?,
            reader_id: row.get(1)?,
            book_id: row.get(2)?,
            edition_id: row.get(3)?,
            lent_by: row.get(4)?,
            borrowed_on: row.get(5)?,
            due_date: row.get(6)?,
            returned_on: row.get(7)?,
            is_active: row.get::<_, i32>(8)? != 0,
            extension_count: row.get(9)?,
            total_extension_days: row.get(10)?,
        })
    }

    fn map_extension(row: &Row<'_>) -> rusqlite::Result<LoanExtension> {
        Ok(LoanExtension {
            extension_id: row.get(0)?,
            borrowing_id: row.get(1)?,
            reader_id: row.get(2)?,
            requested_on: row.get(3)?,
            days: row.get(4)?,
            previous_due_date: row.get(5)?,
            new_due_date: row.get(6)?,
        })
    }

    fn insert_with(conn: &Connection, b: &Borrowing) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            INSERT INTO borrowing (
                borrowing_id, reader_id, book_id, edition_id, lent_by,
                borrowed_on, due_date, returned_on, is_active,
                extension_count, total_extension_days
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                b.borrowing_id,
                b.reader_id,
                b.book_id,
                b.edition_id,
                b.lent_by,
                b.borrowed_on,
                b.due_date,
                b.returned_on,
                b.is_active as i32,
                b.extension_count,
                b.total_extension_days,
            ],
        )
    }

    fn query_borrowings(
        &self,
        where_clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> RepositoryResult<Vec<Borrowing>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM borrowing {}", BORROWING_COLUMNS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, Self::map_borrowing)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 借阅记录 CRUD
    // ==========================================

    pub fn insert(&self, borrowing: &Borrowing) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_with(&conn, borrowing)?;
        Ok(())
    }

    /// 批量插入借阅记录（单事务，全部成功或全部回滚）
    pub fn insert_batch(&self, borrowings: &[Borrowing]) -> RepositoryResult<usize> {
        self.insert_batch_checked(borrowings, &HashMap::new())
    }

    /// 批量插入借阅记录，并在同一事务内复核各书的在借数
    ///
    /// # 参数
    /// - expected_active: book_id → 准入评估时读到的在借数
    ///
    /// # 返回
    /// - Err(OptimisticLockFailure): 评估之后有其他写入改变了在借数，整批不写入
    pub fn insert_batch_checked(
        &self,
        borrowings: &[Borrowing],
        expected_active: &HashMap<String, i32>,
    ) -> RepositoryResult<usize> {
        if borrowings.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        // IMMEDIATE: 复核前即持有写锁
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (book_id, expected) in expected_active {
            let actual: i32 = tx.query_row(
                "SELECT COUNT(*) FROM borrowing WHERE book_id = ?1 AND is_active = 1",
                params![book_id],
                |row| row.get(0),
            )?;
            if actual != *expected {
                return Err(RepositoryError::OptimisticLockFailure {
                    book_id: book_id.clone(),
                    expected: *expected,
                    actual,
                });
            }
        }
        for b in borrowings {
            Self::insert_with(&tx, b)?;
        }
        tx.commit()?;
        Ok(borrowings.len())
    }

    pub fn find_by_id(&self, borrowing_id: &str) -> RepositoryResult<Option<Borrowing>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM borrowing WHERE borrowing_id = ?1",
            BORROWING_COLUMNS
        );
        let borrowing = conn
            .query_row(&sql, params![borrowing_id], Self::map_borrowing)
            .optional()?;
        Ok(borrowing)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Borrowing>> {
        self.query_borrowings("ORDER BY borrowed_on DESC, borrowing_id ASC", &[])
    }

    /// 读者当前借出中的记录（按到期日升序）
    pub fn find_active_by_reader(&self, reader_id: &str) -> RepositoryResult<Vec<Borrowing>> {
        self.query_borrowings(
            "WHERE reader_id = ?1 AND is_active = 1 ORDER BY due_date ASC, borrowing_id ASC",
            &[&reader_id],
        )
    }

    /// 读者全部借阅历史（最近的在前）
    pub fn find_by_reader(&self, reader_id: &str) -> RepositoryResult<Vec<Borrowing>> {
        self.query_borrowings(
            "WHERE reader_id = ?1 ORDER BY borrowed_on DESC, borrowing_id ASC",
            &[&reader_id],
        )
    }

    /// 读者自 since（含）以来的借阅记录，含已归还
    pub fn find_by_reader_since(
        &self,
        reader_id: &str,
        since: NaiveDate,
    ) -> RepositoryResult<Vec<Borrowing>> {
        self.query_borrowings(
            "WHERE reader_id = ?1 AND borrowed_on >= ?2 ORDER BY borrowed_on DESC, borrowing_id ASC",
            &[&reader_id, &since],
        )
    }

    /// 逾期未还记录
    pub fn find_overdue(&self, today: NaiveDate) -> RepositoryResult<Vec<Borrowing>> {
        self.query_borrowings(
            "WHERE is_active = 1 AND due_date < ?1 ORDER BY due_date ASC, borrowing_id ASC",
            &[&today],
        )
    }

    pub fn count_active_by_book(&self, book_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM borrowing WHERE book_id = ?1 AND is_active = 1",
            params![book_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 图书的全部借阅记录数（含已归还）
    pub fn count_by_book(&self, book_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM borrowing WHERE book_id = ?1",
            params![book_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_active_by_reader(&self, reader_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM borrowing WHERE reader_id = ?1 AND is_active = 1",
            params![reader_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 馆员在指定日期经办的借出册数
    pub fn count_lent_by_on(&self, staff_id: &str, date: NaiveDate) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM borrowing WHERE lent_by = ?1 AND borrowed_on = ?2",
            params![staff_id, date],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 标记归还
    ///
    /// # 返回
    /// - 受影响行数；已归还或不存在时为 0
    pub fn mark_returned(&self, borrowing_id: &str, returned_on: NaiveDate) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE borrowing
            SET is_active = 0, returned_on = ?2
            WHERE borrowing_id = ?1 AND is_active = 1
            "#,
            params![borrowing_id, returned_on],
        )?;
        Ok(affected)
    }

    pub fn update(&self, b: &Borrowing) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = Self::update_with(&conn, b)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Borrowing".to_string(),
                id: b.borrowing_id.clone(),
            });
        }
        Ok(())
    }

    fn update_with(conn: &Connection, b: &Borrowing) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            UPDATE borrowing
            SET reader_id = ?2, book_id = ?3, edition_id = ?4, lent_by = ?5,
                borrowed_on = ?6, due_date = ?7, returned_on = ?8, is_active = ?9,
                extension_count = ?10, total_extension_days = ?11
            WHERE borrowing_id = ?1
            "#,
            params![
                b.borrowing_id,
                b.reader_id,
                b.book_id,
                b.edition_id,
                b.lent_by,
                b.borrowed_on,
                b.due_date,
                b.returned_on,
                b.is_active as i32,
                b.extension_count,
                b.total_extension_days,
            ],
        )
    }

    pub fn delete(&self, borrowing_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM borrowing WHERE borrowing_id = ?1",
            params![borrowing_id],
        )?;
        Ok(affected)
    }

    // ==========================================
    // 续借
    // ==========================================

    /// 写入续借记录并更新借阅（单事务）
    ///
    /// # 参数
    /// - updated: 已应用续借的借阅记录（新到期日、续借次数、累计天数）
    /// - extension: 续借记录
    pub fn apply_extension(
        &self,
        updated: &Borrowing,
        extension: &LoanExtension,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let affected = Self::update_with(&tx, updated)?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Borrowing".to_string(),
                id: updated.borrowing_id.clone(),
            });
        }

        tx.execute(
            r#"
            INSERT INTO loan_extension (
                extension_id, borrowing_id, reader_id, requested_on, days,
                previous_due_date, new_due_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                extension.extension_id,
                extension.borrowing_id,
                extension.reader_id,
                extension.requested_on,
                extension.days,
                extension.previous_due_date,
                extension.new_due_date,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 读者自 since（含）以来的续借记录
    pub fn find_extensions_by_reader_since(
        &self,
        reader_id: &str,
        since: NaiveDate,
    ) -> RepositoryResult<Vec<LoanExtension>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM loan_extension
            WHERE reader_id = ?1 AND requested_on >= ?2
            ORDER BY requested_on ASC, extension_id ASC
            "#,
            EXTENSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![reader_id, since], Self::map_extension)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn find_extensions_by_borrowing(
        &self,
        borrowing_id: &str,
    ) -> RepositoryResult<Vec<LoanExtension>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM loan_extension WHERE borrowing_id = ?1 ORDER BY requested_on ASC, extension_id ASC",
            EXTENSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![borrowing_id], Self::map_extension)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
