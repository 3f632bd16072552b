// ==========================================
// 图书馆借阅管理系统 - 图书数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: book 主记录与 book_author / book_domain 关联在同一事务内写入
// 约束: 导入的馆藏条目（新作者 + 图书 + 版本）在同一事务内写入
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::author::Author;
use crate::domain::book::{Book, Edition};
use crate::repository::author_repo::AuthorRepository;
use crate::repository::edition_repo::EditionRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// BookRepository - 图书仓储
// ==========================================
pub struct BookRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BookRepository {
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

    /// 写入作者/领域关联（调用方负责事务）
    fn write_links(conn: &Connection, book: &Book) -> rusqlite::Result<()> {
        conn.execute("DELETE FROM book_author WHERE book_id = ?1", params![book.book_id])?;
        conn.execute("DELETE FROM book_domain WHERE book_id = ?1", params![book.book_id])?;

        let mut author_stmt = conn.prepare(
            "INSERT INTO book_author (book_id, author_id, position) VALUES (?1, ?2, ?3)",
        )?;
        for (pos, author_id) in book.author_ids.iter().enumerate() {
            author_stmt.execute(params![book.book_id, author_id, pos as i32])?;
        }

        let mut domain_stmt =
            conn.prepare("INSERT INTO book_domain (book_id, domain_id) VALUES (?1, ?2)")?;
        for domain_id in &book.domain_ids {
            domain_stmt.execute(params![book.book_id, domain_id])?;
        }
        Ok(())
    }

    /// 读取作者/领域关联
    fn load_links(conn: &Connection, book: &mut Book) -> rusqlite::Result<()> {
        let mut stmt = conn.prepare(
            "SELECT author_id FROM book_author WHERE book_id = ?1 ORDER BY position ASC",
        )?;
        book.author_ids = stmt
            .query_map(params![book.book_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        let mut stmt = conn.prepare(
            "SELECT domain_id FROM book_domain WHERE book_id = ?1 ORDER BY domain_id ASC",
        )?;
        book.domain_ids = stmt
            .query_map(params![book.book_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(())
    }

    /// 按 SQL 查询图书主记录并补全关联
    fn query_books(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> rusqlite::Result<Vec<Book>> {
        let mut stmt = conn.prepare(sql)?;
        let mut books = stmt
            .query_map(args, |row| {
                Ok(Book {
                    book_id: row.get(0)?,
                    title: row.get(1)?,
                    total_copies: row.get(2)?,
                    reading_room_copies: row.get(3)?,
                    author_ids: Vec::new(),
                    domain_ids: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for book in books.iter_mut() {
            Self::load_links(conn, book)?;
        }
        Ok(books)
    }

    /// 写入图书主记录与关联（调用方负责事务）
    fn insert_with(conn: &Connection, book: &Book) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO book (book_id, title, total_copies, reading_room_copies)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                book.book_id,
                book.title,
                book.total_copies,
                book.reading_room_copies
            ],
        )?;
        Self::write_links(conn, book)
    }

    /// 新增图书（含关联）
    pub fn insert(&self, book: &Book) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        Self::insert_with(&tx, book)?;
        tx.commit()?;
        Ok(())
    }

    /// 新增馆藏条目: 新作者 + 图书（含关联）+ 可选版本，单事务
    ///
    /// 任一写入失败时整体回滚，不留下孤立的作者记录
    pub fn insert_catalog_entry(
        &self,
        new_authors: &[Author],
        book: &Book,
        edition: Option<&Edition>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for author in new_authors {
            AuthorRepository::insert_with(&tx, author)?;
        }
        Self::insert_with(&tx, book)?;
        if let Some(e) = edition {
            EditionRepository::insert_with(&tx, e)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn find_by_id(&self, book_id: &str) -> RepositoryResult<Option<Book>> {
        let conn = self.get_conn()?;
        let book = conn
            .query_row(
                "SELECT book_id, title, total_copies, reading_room_copies FROM book WHERE book_id = ?1",
                params![book_id],
                |row| {
                    Ok(Book {
                        book_id: row.get(0)?,
                        title: row.get(1)?,
                        total_copies: row.get(2)?,
                        reading_room_copies: row.get(3)?,
                        author_ids: Vec::new(),
                        domain_ids: Vec::new(),
                    })
                },
            )
            .optional()?;

        match book {
            Some(mut b) => {
                Self::load_links(&conn, &mut b)?;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Book>> {
        let conn = self.get_conn()?;
        let books = Self::query_books(
            &conn,
            "SELECT book_id, title, total_copies, reading_room_copies FROM book ORDER BY title ASC",
            &[],
        )?;
        Ok(books)
    }

    /// 查询直接挂在指定领域下的图书
    pub fn find_by_domain(&self, domain_id: &str) -> RepositoryResult<Vec<Book>> {
        let conn = self.get_conn()?;
        let books = Self::query_books(
            &conn,
            r#"
            SELECT b.book_id, b.title, b.total_copies, b.reading_room_copies
            FROM book b
            JOIN book_domain bd ON bd.book_id = b.book_id
            WHERE bd.domain_id = ?1
            ORDER BY b.title ASC
            "#,
            &[&domain_id],
        )?;
        Ok(books)
    }

    /// 查询挂在任一指定领域下的图书（去重）
    pub fn find_by_domains(&self, domain_ids: &[String]) -> RepositoryResult<Vec<Book>> {
        if domain_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let placeholders = vec!["?"; domain_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT DISTINCT b.book_id, b.title, b.total_copies, b.reading_room_copies
            FROM book b
            JOIN book_domain bd ON bd.book_id = b.book_id
            WHERE bd.domain_id IN ({})
            ORDER BY b.title ASC
            "#,
            placeholders
        );
        let args: Vec<&dyn rusqlite::ToSql> =
            domain_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let books = Self::query_books(&conn, &sql, &args)?;
        Ok(books)
    }

    pub fn find_by_author(&self, author_id: &str) -> RepositoryResult<Vec<Book>> {
        let conn = self.get_conn()?;
        let books = Self::query_books(
            &conn,
            r#"
            SELECT b.book_id, b.title, b.total_copies, b.reading_room_copies
            FROM book b
            JOIN book_author ba ON ba.book_id = b.book_id
            WHERE ba.author_id = ?1
            ORDER BY b.title ASC
            "#,
            &[&author_id],
        )?;
        Ok(books)
    }

    /// 统计直接挂在指定领域下的图书数
    pub fn count_by_domain(&self, domain_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM book_domain WHERE domain_id = ?1",
            params![domain_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 更新图书（关联整体替换）
    pub fn update(&self, book: &Book) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let affected = tx.execute(
            r#"
            UPDATE book SET title = ?2, total_copies = ?3, reading_room_copies = ?4
            WHERE book_id = ?1
            "#,
            params![
                book.book_id,
                book.title,
                book.total_copies,
                book.reading_room_copies
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Book".to_string(),
                id: book.book_id.clone(),
            });
        }
        Self::write_links(&tx, book)?;
        tx.commit()?;
        Ok(())
    }

    /// 删除图书（关联、版本、借阅历史级联删除）
    pub fn delete(&self, book_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM book WHERE book_id = ?1", params![book_id])?;
        Ok(affected)
    }
}
