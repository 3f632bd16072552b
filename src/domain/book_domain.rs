// ==========================================
// 图书馆借阅管理系统 - 学科领域模型
// ==========================================
// 红线: 同一本书不得同时属于某领域及其后代领域
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// BookDomain - 学科领域（树形）
// ==========================================
// 对齐: book_domain_def 表
// parent_id 为空表示根领域
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDomain {
    pub domain_id: String,
    pub name: String,
    pub parent_id: Option<String>,
}

impl BookDomain {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

// ==========================================
// DomainNode - 领域树节点（用于树形展示）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainNode {
    pub domain: BookDomain,
    pub children: Vec<DomainNode>,
}

impl DomainNode {
    /// 子树节点总数（含自身）
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(DomainNode::size).sum::<usize>()
    }
}
