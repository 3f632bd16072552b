// ==========================================
// 图书馆借阅管理系统 - 作者领域模型
// ==========================================

use serde::{Deserialize, Serialize};

// 对齐: author 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub author_id: String,
    pub first_name: String,
    pub last_name: String,
}

impl Author {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// 按全名匹配（忽略大小写和首尾空白）
    pub fn matches_name(&self, full_name: &str) -> bool {
        self.full_name().eq_ignore_ascii_case(full_name.trim())
    }
}
