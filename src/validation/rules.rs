// ==========================================
// 图书馆借阅管理系统 - 校验基础类型
// ==========================================
// 职责: 违规详情、违规汇总、通用字段规则
// 红线: 返回全部违规，而不是第一条
// ==========================================

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_TITLE_LEN: usize = 255;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 \-]*$").expect("phone regex"));

// ==========================================
// ValidationViolation - 校验违规详情
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub entity: String, // Reader / Author / Book / Edition / BookDomain / LoanExtension
    pub field: String,
    pub reason: String,
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.entity, self.field, self.reason)
    }
}

// ==========================================
// ValidationReport - 违规汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    entity: String,
    violations: Vec<ValidationViolation>,
}

impl ValidationReport {
    pub fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            violations: Vec::new(),
        }
    }

    pub fn add(&mut self, field: &str, reason: impl Into<String>) {
        self.violations.push(ValidationViolation {
            entity: self.entity.clone(),
            field: field.to_string(),
            reason: reason.into(),
        });
    }

    /// 必填文本（去首尾空白后非空）且不超过 max_len 个字符
    pub fn require_text(&mut self, field: &str, value: &str, max_len: usize) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, "不能为空");
        } else if trimmed.chars().count() > max_len {
            self.add(field, format!("长度不能超过 {} 个字符", max_len));
        }
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[ValidationViolation] {
        &self.violations
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn into_result(self) -> Result<(), Vec<ValidationViolation>> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(self.violations)
        }
    }
}

// ==========================================
// 格式规则
// ==========================================

/// 邮箱形如 local@domain.tld
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// 电话: 可选前导 +，允许空格与短横线，数字 6..=15 位
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    if !PHONE_RE.is_match(phone) {
        return false;
    }
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    (6..=15).contains(&digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("ana.pop@lib.example.org"));
        assert!(is_valid_email(" a@b.io "));
        assert!(!is_valid_email("ana@lib"));
        assert!(!is_valid_email("ana lib@x.io"));
        assert!(!is_valid_email("@x.io"));
    }

    #[test]
    fn test_phone_format() {
        assert!(is_valid_phone("+40 721-000-111"));
        assert!(is_valid_phone("123456"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("1234567890123456"));
        assert!(!is_valid_phone("07x1234567"));
        assert!(!is_valid_phone("++40721000111"));
    }

    #[test]
    fn test_report_collects_all() {
        let mut r = ValidationReport::new("Reader");
        r.require_text("first_name", "   ", MAX_NAME_LEN);
        r.require_text("last_name", &"x".repeat(101), MAX_NAME_LEN);
        r.require_text("address", "ok", MAX_NAME_LEN);

        assert!(!r.is_valid());
        assert!(r.has_field("first_name"));
        assert!(r.has_field("last_name"));
        assert!(!r.has_field("address"));

        let violations = r.into_result().unwrap_err();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].to_string(), "Reader.first_name: 不能为空");
    }
}
