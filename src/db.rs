// ==========================================
// 图书馆借阅管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表脚本，保证测试库与生产库结构一致
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建表脚本（幂等）
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS reader (
    reader_id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT UNIQUE,
    phone TEXT,
    address TEXT,
    is_staff INTEGER NOT NULL DEFAULT 0,
    registered_on TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS author (
    author_id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS book_domain_def (
    domain_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    parent_id TEXT REFERENCES book_domain_def(domain_id)
);

CREATE TABLE IF NOT EXISTS book (
    book_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    total_copies INTEGER NOT NULL,
    reading_room_copies INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS book_author (
    book_id TEXT NOT NULL REFERENCES book(book_id) ON DELETE CASCADE,
    author_id TEXT NOT NULL REFERENCES author(author_id),
    position INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (book_id, author_id)
);

CREATE TABLE IF NOT EXISTS book_domain (
    book_id TEXT NOT NULL REFERENCES book(book_id) ON DELETE CASCADE,
    domain_id TEXT NOT NULL REFERENCES book_domain_def(domain_id),
    PRIMARY KEY (book_id, domain_id)
);

CREATE TABLE IF NOT EXISTS edition (
    edition_id TEXT PRIMARY KEY,
    book_id TEXT NOT NULL REFERENCES book(book_id) ON DELETE CASCADE,
    publisher TEXT NOT NULL,
    publication_year INTEGER NOT NULL,
    page_count INTEGER NOT NULL,
    book_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS borrowing (
    borrowing_id TEXT PRIMARY KEY,
    reader_id TEXT NOT NULL REFERENCES reader(reader_id) ON DELETE CASCADE,
    book_id TEXT NOT NULL REFERENCES book(book_id),
    edition_id TEXT REFERENCES edition(edition_id) ON DELETE SET NULL,
    lent_by TEXT REFERENCES reader(reader_id) ON DELETE SET NULL,
    borrowed_on TEXT NOT NULL,
    due_date TEXT NOT NULL,
    returned_on TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    extension_count INTEGER NOT NULL DEFAULT 0,
    total_extension_days INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS loan_extension (
    extension_id TEXT PRIMARY KEY,
    borrowing_id TEXT NOT NULL REFERENCES borrowing(borrowing_id) ON DELETE CASCADE,
    reader_id TEXT NOT NULL,
    requested_on TEXT NOT NULL,
    days INTEGER NOT NULL,
    previous_due_date TEXT NOT NULL,
    new_due_date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_borrowing_reader ON borrowing(reader_id, borrowed_on);
CREATE INDEX IF NOT EXISTS idx_borrowing_book_active ON borrowing(book_id, is_active);
CREATE INDEX IF NOT EXISTS idx_borrowing_lender ON borrowing(lent_by, borrowed_on);
CREATE INDEX IF NOT EXISTS idx_extension_reader ON loan_extension(reader_id, requested_on);
CREATE INDEX IF NOT EXISTS idx_domain_parent ON book_domain_def(parent_id);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库并建表（测试与演示用）
pub fn open_in_memory() -> rusqlite::Result<Arc<Mutex<Connection>>> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 初始化 schema（幂等）并登记 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_in_memory().unwrap();
        let conn = conn.lock().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
