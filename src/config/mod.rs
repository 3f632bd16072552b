// ==========================================
// 图书馆借阅管理系统 - 配置层
// ==========================================
// 职责: 借阅政策参数管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod policy_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use policy_config_trait::PolicyConfigReader;
