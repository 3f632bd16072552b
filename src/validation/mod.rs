// ==========================================
// 图书馆借阅管理系统 - 校验层
// ==========================================
// 职责: 实体级规则校验（必填、数值范围、引用约束）
// 红线: 校验不读写数据库，引用数据由调用方传入
// ==========================================

pub mod catalog;
pub mod domain;
pub mod reader;
pub mod rules;

pub use catalog::{validate_author, validate_book, validate_edition, MIN_PUBLICATION_YEAR};
pub use domain::validate_domain;
pub use reader::validate_reader;
pub use rules::{ValidationReport, ValidationViolation};

/// 续借请求校验: days >= 1
pub fn validate_extension_days(days: i32) -> ValidationReport {
    let mut report = ValidationReport::new("LoanExtension");
    if days < 1 {
        report.add("days", format!("续借天数至少为 1，实际为 {}", days));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_days() {
        assert!(validate_extension_days(1).is_valid());
        assert!(validate_extension_days(0).has_field("days"));
        assert!(validate_extension_days(-3).has_field("days"));
    }
}
