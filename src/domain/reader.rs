// ==========================================
// 图书馆借阅管理系统 - 读者领域模型
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Reader - 读者
// ==========================================
// 对齐: reader 表
// 馆员 (is_staff) 同样是读者，享受加倍的借阅额度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reader {
    pub reader_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_staff: bool,            // 馆员标记
    pub registered_on: NaiveDate, // 注册日期
}

impl Reader {
    /// 读者全名 (名 + 姓)
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}
