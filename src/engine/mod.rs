// ==========================================
// 图书馆借阅管理系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎，不拼 SQL
// 红线: Engine 不拼 SQL，所有拒绝必须输出原因
// ==========================================

pub mod borrowing_eligibility;
pub mod borrowing_rules_core;
pub mod domain_hierarchy;
pub mod extension;

// 重导出核心引擎
pub use borrowing_eligibility::{
    BorrowingContext, BorrowingEligibilityEngine, BorrowingHistoryEntry, RequestedBook,
};
pub use borrowing_rules_core::BorrowingRulesCore;
pub use domain_hierarchy::DomainHierarchy;
pub use extension::ExtensionEngine;
