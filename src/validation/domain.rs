use crate::domain::book_domain::BookDomain;
use crate::engine::DomainHierarchy;
use crate::validation::rules::{ValidationReport, MAX_NAME_LEN};

/// 领域校验（新建或修改）
///
/// # 规则
/// - name 必填，最长 100
/// - parent 必须存在，不能为自身，不能造成环
/// - 同一父领域下名称唯一（不区分大小写）
///
/// # 参数
/// - hierarchy: 当前全量层级（修改时包含 domain 自身的旧值）
pub fn validate_domain(domain: &BookDomain, hierarchy: &DomainHierarchy) -> ValidationReport {
    let mut report = ValidationReport::new("BookDomain");
    report.require_text("name", &domain.name, MAX_NAME_LEN);

    if let Some(parent) = domain.parent_id.as_deref() {
        if parent == domain.domain_id {
            report.add("parent_id", "领域不能以自身为父领域");
        } else if !hierarchy.contains(parent) {
            report.add("parent_id", format!("父领域不存在: {}", parent));
        } else if hierarchy.would_create_cycle(&domain.domain_id, Some(parent)) {
            report.add(
                "parent_id",
                format!("将 {} 挂到 {} 下会形成环", domain.domain_id, parent),
            );
        }
    }

    let name = domain.name.trim().to_lowercase();
    let siblings = match domain.parent_id.as_deref() {
        Some(parent) => hierarchy.children(parent),
        None => hierarchy.roots(),
    };
    let clash = siblings
        .iter()
        .any(|s| s.domain_id != domain.domain_id && s.name.trim().to_lowercase() == name);
    if !name.is_empty() && clash {
        report.add("name", format!("同一父领域下已存在同名领域: {}", domain.name.trim()));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk(id: &str, name: &str, parent: Option<&str>) -> BookDomain {
        BookDomain {
            domain_id: id.to_string(),
            name: name.to_string(),
            parent_id: parent.map(|p| p.to_string()),
        }
    }

    fn hierarchy() -> DomainHierarchy {
        DomainHierarchy::new(vec![
            mk("SCI", "Science", None),
            mk("CS", "Computer Science", Some("SCI")),
            mk("ALG", "Algorithms", Some("CS")),
        ])
    }

    #[test]
    fn test_new_domain_ok() {
        let report = validate_domain(&mk("DB", "Databases", Some("CS")), &hierarchy());
        assert!(report.is_valid(), "{}", report.summary());
    }

    #[test]
    fn test_sibling_name_unique() {
        let h = hierarchy();
        assert!(validate_domain(&mk("X", "algorithms", Some("CS")), &h).has_field("name"));
        // 不同父领域下同名允许
        assert!(validate_domain(&mk("X", "Algorithms", Some("SCI")), &h).is_valid());
        // 自身改名不与自己冲突
        assert!(validate_domain(&mk("ALG", "Algorithms", Some("CS")), &h).is_valid());
        // 根领域之间
        assert!(validate_domain(&mk("Y", "SCIENCE", None), &h).has_field("name"));
    }

    #[test]
    fn test_parent_rules() {
        let h = hierarchy();
        assert!(validate_domain(&mk("X", "X", Some("NOPE")), &h).has_field("parent_id"));
        assert!(validate_domain(&mk("CS", "Computer Science", Some("CS")), &h).has_field("parent_id"));
        let cycle = validate_domain(&mk("SCI", "Science", Some("ALG")), &h);
        assert!(cycle.has_field("parent_id"));
        assert!(cycle.violations()[0].reason.contains("环"));
    }
}
