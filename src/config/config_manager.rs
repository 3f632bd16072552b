// ==========================================
// 图书馆借阅管理系统 - 配置管理器
// ==========================================
// 职责: 借阅政策参数的加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::policy_config_trait::PolicyConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::policy::LibraryPolicy;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 读取并解析数值配置
    ///
    /// 配置缺失 → 默认值
    /// 配置格式错误 → 默认值 + 告警日志
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(
                        config_key = key,
                        raw_value = %raw,
                        default = %default,
                        "配置格式错误，使用默认值"
                    );
                    Ok(default)
                }
            },
        }
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 删除配置值（恢复默认）
    pub fn delete_config_value(&self, key: &str) -> Result<bool, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
        )?;
        Ok(affected > 0)
    }

    /// 将整套政策写入配置表
    pub fn save_policy(&self, policy: &LibraryPolicy) -> Result<(), Box<dyn Error>> {
        let entries: Vec<(&str, String)> = vec![
            (config_keys::MAX_BOOKS_PER_PERIOD, policy.max_books_per_period.to_string()),
            (config_keys::PERIOD_DAYS, policy.period_days.to_string()),
            (config_keys::MAX_BOOKS_PER_REQUEST, policy.max_books_per_request.to_string()),
            (config_keys::MAX_BOOKS_PER_DOMAIN, policy.max_books_per_domain.to_string()),
            (config_keys::DOMAIN_WINDOW_MONTHS, policy.domain_window_months.to_string()),
            (config_keys::MAX_EXTENSION_DAYS, policy.max_extension_days.to_string()),
            (config_keys::EXTENSION_WINDOW_MONTHS, policy.extension_window_months.to_string()),
            (config_keys::MIN_DAYS_BETWEEN_SAME_BOOK, policy.min_days_between_same_book.to_string()),
            (config_keys::MAX_BOOKS_PER_DAY, policy.max_books_per_day.to_string()),
            (config_keys::MAX_LOANS_SERVED_PER_DAY, policy.max_loans_served_per_day.to_string()),
            (config_keys::DIVERSITY_THRESHOLD_BOOKS, policy.diversity_threshold_books.to_string()),
            (config_keys::MIN_DISTINCT_DOMAINS, policy.min_distinct_domains.to_string()),
            (config_keys::AVAILABILITY_THRESHOLD_RATIO, policy.availability_threshold_ratio.to_string()),
            (config_keys::LOAN_DAYS, policy.loan_days.to_string()),
            (config_keys::STAFF_MULTIPLIER, policy.staff_multiplier.to_string()),
        ];

        for (key, value) in entries {
            self.set_config_value(key, &value)?;
        }
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 政策调整前留档，便于回滚
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的global配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            let affected = tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            count += affected;
        }

        tx.commit()?;

        Ok(count)
    }
}

// ==========================================
// PolicyConfigReader Trait 实现
// ==========================================
#[async_trait]
impl PolicyConfigReader for ConfigManager {
    async fn get_max_books_per_period(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().max_books_per_period;
        self.get_parsed_or_default(config_keys::MAX_BOOKS_PER_PERIOD, d)
    }

    async fn get_period_days(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().period_days;
        self.get_parsed_or_default(config_keys::PERIOD_DAYS, d)
    }

    async fn get_max_books_per_request(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().max_books_per_request;
        self.get_parsed_or_default(config_keys::MAX_BOOKS_PER_REQUEST, d)
    }

    async fn get_max_books_per_domain(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().max_books_per_domain;
        self.get_parsed_or_default(config_keys::MAX_BOOKS_PER_DOMAIN, d)
    }

    async fn get_domain_window_months(&self) -> Result<u32, Box<dyn Error>> {
        let d = LibraryPolicy::default().domain_window_months;
        self.get_parsed_or_default(config_keys::DOMAIN_WINDOW_MONTHS, d)
    }

    async fn get_max_extension_days(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().max_extension_days;
        self.get_parsed_or_default(config_keys::MAX_EXTENSION_DAYS, d)
    }

    async fn get_extension_window_months(&self) -> Result<u32, Box<dyn Error>> {
        let d = LibraryPolicy::default().extension_window_months;
        self.get_parsed_or_default(config_keys::EXTENSION_WINDOW_MONTHS, d)
    }

    async fn get_min_days_between_same_book(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().min_days_between_same_book;
        self.get_parsed_or_default(config_keys::MIN_DAYS_BETWEEN_SAME_BOOK, d)
    }

    async fn get_max_books_per_day(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().max_books_per_day;
        self.get_parsed_or_default(config_keys::MAX_BOOKS_PER_DAY, d)
    }

    async fn get_max_loans_served_per_day(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().max_loans_served_per_day;
        self.get_parsed_or_default(config_keys::MAX_LOANS_SERVED_PER_DAY, d)
    }

    async fn get_diversity_threshold_books(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().diversity_threshold_books;
        self.get_parsed_or_default(config_keys::DIVERSITY_THRESHOLD_BOOKS, d)
    }

    async fn get_min_distinct_domains(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().min_distinct_domains;
        self.get_parsed_or_default(config_keys::MIN_DISTINCT_DOMAINS, d)
    }

    async fn get_availability_threshold_ratio(&self) -> Result<f64, Box<dyn Error>> {
        let d = LibraryPolicy::default().availability_threshold_ratio;
        let ratio = self.get_parsed_or_default(config_keys::AVAILABILITY_THRESHOLD_RATIO, d)?;
        if !(0.0..=1.0).contains(&ratio) {
            tracing::warn!(ratio, "可借阈值比例超出 [0, 1]，使用默认值");
            return Ok(d);
        }
        Ok(ratio)
    }

    async fn get_loan_days(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().loan_days;
        self.get_parsed_or_default(config_keys::LOAN_DAYS, d)
    }

    async fn get_staff_multiplier(&self) -> Result<i32, Box<dyn Error>> {
        let d = LibraryPolicy::default().staff_multiplier;
        self.get_parsed_or_default(config_keys::STAFF_MULTIPLIER, d)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 周期额度
    pub const MAX_BOOKS_PER_PERIOD: &str = "max_books_per_period"; // NMC
    pub const PERIOD_DAYS: &str = "period_days"; // PER
    pub const MAX_BOOKS_PER_REQUEST: &str = "max_books_per_request"; // C

    // 领域额度
    pub const MAX_BOOKS_PER_DOMAIN: &str = "max_books_per_domain"; // D
    pub const DOMAIN_WINDOW_MONTHS: &str = "domain_window_months"; // L

    // 续借
    pub const MAX_EXTENSION_DAYS: &str = "max_extension_days"; // LIM
    pub const EXTENSION_WINDOW_MONTHS: &str = "extension_window_months";
    pub const MIN_DAYS_BETWEEN_SAME_BOOK: &str = "min_days_between_same_book"; // DELTA

    // 每日额度
    pub const MAX_BOOKS_PER_DAY: &str = "max_books_per_day"; // NCZ
    pub const MAX_LOANS_SERVED_PER_DAY: &str = "max_loans_served_per_day"; // PERSIMP

    // 多样性 / 可借阈值
    pub const DIVERSITY_THRESHOLD_BOOKS: &str = "diversity_threshold_books";
    pub const MIN_DISTINCT_DOMAINS: &str = "min_distinct_domains";
    pub const AVAILABILITY_THRESHOLD_RATIO: &str = "availability_threshold_ratio";

    pub const LOAN_DAYS: &str = "loan_days";
    pub const STAFF_MULTIPLIER: &str = "staff_multiplier";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = crate::db::open_in_memory().unwrap();
        ConfigManager::from_connection(conn).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let config = setup();
        let policy = config.load_policy().await.unwrap();
        assert_eq!(policy, LibraryPolicy::default());
    }

    #[tokio::test]
    async fn test_override_and_malformed_fallback() {
        let config = setup();
        config.set_config_value(config_keys::MAX_BOOKS_PER_REQUEST, "7").unwrap();
        config.set_config_value(config_keys::PERIOD_DAYS, "thirty").unwrap();
        config
            .set_config_value(config_keys::AVAILABILITY_THRESHOLD_RATIO, "1.5")
            .unwrap();

        assert_eq!(config.get_max_books_per_request().await.unwrap(), 7);
        assert_eq!(config.get_period_days().await.unwrap(), 30);
        assert_eq!(config.get_availability_threshold_ratio().await.unwrap(), 0.10);

        assert!(config.delete_config_value(config_keys::MAX_BOOKS_PER_REQUEST).unwrap());
        assert_eq!(config.get_max_books_per_request().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_save_policy_round_trip() {
        let config = setup();
        let policy = LibraryPolicy {
            max_books_per_domain: 2,
            loan_days: 21,
            availability_threshold_ratio: 0.25,
            ..LibraryPolicy::default()
        };
        config.save_policy(&policy).unwrap();
        assert_eq!(config.load_policy().await.unwrap(), policy);
    }

    #[test]
    fn test_snapshot_restore() {
        let config = setup();
        config.set_config_value(config_keys::LOAN_DAYS, "10").unwrap();
        let snapshot = config.get_config_snapshot().unwrap();

        config.set_config_value(config_keys::LOAN_DAYS, "30").unwrap();
        let restored = config.restore_config_from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(
            config.get_global_config_value(config_keys::LOAN_DAYS).unwrap(),
            Some("10".to_string())
        );
    }
}
