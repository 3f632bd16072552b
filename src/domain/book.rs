// ==========================================
// 图书馆借阅管理系统 - 图书与版本领域模型
// ==========================================
// 红线: 阅览室副本不可外借
// ==========================================

use crate::domain::types::BookType;
use serde::{Deserialize, Serialize};

// ==========================================
// Book - 图书
// ==========================================
// 对齐: book / book_author / book_domain 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: String,
    pub title: String,

    // ===== 馆藏数量 =====
    pub total_copies: i32,        // 馆藏总副本数（初始库存）
    pub reading_room_copies: i32, // 仅限阅览室的副本数

    // ===== 关联 =====
    pub author_ids: Vec<String>,
    pub domain_ids: Vec<String>, // 直接所属领域（不含祖先）
}

impl Book {
    /// 可外借副本数 = 总副本 - 阅览室副本（最小为 0）
    pub fn lendable_copies(&self) -> i32 {
        (self.total_copies - self.reading_room_copies).max(0)
    }

    /// 是否仅限阅览室
    pub fn is_reading_room_only(&self) -> bool {
        self.lendable_copies() == 0
    }
}

// ==========================================
// Edition - 版本
// ==========================================
// 对齐: edition 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edition {
    pub edition_id: String,
    pub book_id: String,
    pub publisher: String,
    pub publication_year: i32,
    pub page_count: i32,
    pub book_type: BookType,
}

// ==========================================
// BookAvailability - 图书可借情况
// ==========================================
// 用途: 借阅前的可借副本展示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookAvailability {
    pub book_id: String,
    pub total_copies: i32,
    pub lendable_copies: i32,
    pub active_loans: i32,
    pub available_copies: i32, // lendable - active_loans（最小为 0）
}

impl BookAvailability {
    pub fn from_book(book: &Book, active_loans: i32) -> Self {
        let lendable = book.lendable_copies();
        Self {
            book_id: book.book_id.clone(),
            total_copies: book.total_copies,
            lendable_copies: lendable,
            active_loans,
            available_copies: (lendable - active_loans).max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_book(total: i32, reading_room: i32) -> Book {
        Book {
            book_id: "B001".to_string(),
            title: "Test".to_string(),
            total_copies: total,
            reading_room_copies: reading_room,
            author_ids: vec!["A001".to_string()],
            domain_ids: vec!["D001".to_string()],
        }
    }

    #[test]
    fn test_lendable_copies() {
        assert_eq!(make_book(10, 2).lendable_copies(), 8);
        assert_eq!(make_book(3, 3).lendable_copies(), 0);
        assert!(make_book(3, 3).is_reading_room_only());
        // 异常数据: 阅览室副本多于总数
        assert_eq!(make_book(2, 5).lendable_copies(), 0);
    }

    #[test]
    fn test_availability_never_negative() {
        let book = make_book(5, 1);
        let availability = BookAvailability::from_book(&book, 7);
        assert_eq!(availability.lendable_copies, 4);
        assert_eq!(availability.available_copies, 0);

        let availability = BookAvailability::from_book(&book, 1);
        assert_eq!(availability.available_copies, 3);
    }
}
