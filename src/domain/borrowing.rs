// ==========================================
// 图书馆借阅管理系统 - 借阅领域模型
// ==========================================
// 状态: is_active = true 借出中 / false 已归还
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Borrowing - 借阅记录
// ==========================================
// 对齐: borrowing 表
// 一条记录对应一本书的一个副本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrowing {
    pub borrowing_id: String,
    pub reader_id: String,
    pub book_id: String,
    pub edition_id: Option<String>,
    pub lent_by: Option<String>, // 经办馆员 reader_id

    // ===== 日期 =====
    pub borrowed_on: NaiveDate,
    pub due_date: NaiveDate,
    pub returned_on: Option<NaiveDate>,

    // ===== 状态 =====
    pub is_active: bool,

    // ===== 续借追踪 =====
    pub extension_count: i32,
    pub total_extension_days: i32,
}

impl Borrowing {
    /// 是否逾期（仅对借出中的记录有意义）
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_active && self.due_date < today
    }

    /// 逾期天数（未逾期为 0）
    pub fn overdue_days(&self, today: NaiveDate) -> i64 {
        if self.is_overdue(today) {
            (today - self.due_date).num_days()
        } else {
            0
        }
    }
}

// ==========================================
// LoanExtension - 续借记录
// ==========================================
// 对齐: loan_extension 表
// reader_id 冗余存储，便于按读者统计滚动窗口内的续借天数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanExtension {
    pub extension_id: String,
    pub borrowing_id: String,
    pub reader_id: String,
    pub requested_on: NaiveDate,
    pub days: i32,
    pub previous_due_date: NaiveDate,
    pub new_due_date: NaiveDate,
}
