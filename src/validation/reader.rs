use crate::domain::reader::Reader;
use crate::validation::rules::{is_valid_email, is_valid_phone, ValidationReport, MAX_NAME_LEN};

/// 读者校验
///
/// # 规则
/// - first_name / last_name 必填，最长 100
/// - email 与 phone 至少填写一项，填写的须符合格式
pub fn validate_reader(reader: &Reader) -> ValidationReport {
    let mut report = ValidationReport::new("Reader");
    report.require_text("first_name", &reader.first_name, MAX_NAME_LEN);
    report.require_text("last_name", &reader.last_name, MAX_NAME_LEN);

    let email = reader.email.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let phone = reader.phone.as_deref().map(str::trim).filter(|s| !s.is_empty());

    if email.is_none() && phone.is_none() {
        report.add("email", "邮箱与电话至少填写一项");
    }
    if let Some(e) = email {
        if !is_valid_email(e) {
            report.add("email", format!("邮箱格式无效: {}", e));
        }
    }
    if let Some(p) = phone {
        if !is_valid_phone(p) {
            report.add("phone", format!("电话格式无效: {}", p));
        }
    }
    report
}
