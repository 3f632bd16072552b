// ==========================================
// 图书馆借阅管理系统 - 领域类型定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 版本装帧类型 (Book Type)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookType {
    Hardcover, // 精装
    Paperback, // 平装
    Ebook,     // 电子书
    Audio,     // 有声书
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl BookType {
    /// 从字符串解析装帧类型
    ///
    /// 未知值返回 None，由调用方决定兜底策略
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HARDCOVER" => Some(BookType::Hardcover),
            "PAPERBACK" => Some(BookType::Paperback),
            "EBOOK" => Some(BookType::Ebook),
            "AUDIO" => Some(BookType::Audio),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BookType::Hardcover => "HARDCOVER",
            BookType::Paperback => "PAPERBACK",
            BookType::Ebook => "EBOOK",
            BookType::Audio => "AUDIO",
        }
    }
}
