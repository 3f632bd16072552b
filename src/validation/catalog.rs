// ==========================================
// 图书馆借阅管理系统 - 馆藏校验
// ==========================================
// 红线: 图书的领域集合不得同时包含祖先与后代
// ==========================================

use crate::domain::author::Author;
use crate::domain::book::{Book, Edition};
use crate::engine::DomainHierarchy;
use crate::validation::rules::{ValidationReport, MAX_NAME_LEN, MAX_TITLE_LEN};
use std::collections::HashSet;

/// 最早出版年份（活字印刷）
pub const MIN_PUBLICATION_YEAR: i32 = 1450;

pub fn validate_author(author: &Author) -> ValidationReport {
    let mut report = ValidationReport::new("Author");
    report.require_text("first_name", &author.first_name, MAX_NAME_LEN);
    report.require_text("last_name", &author.last_name, MAX_NAME_LEN);
    report
}

/// 图书校验
///
/// # 参数
/// - known_author_ids: 已存在的作者 id
/// - hierarchy: 全量领域层级（用于存在性与祖先/后代冲突检查）
pub fn validate_book(
    book: &Book,
    known_author_ids: &HashSet<String>,
    hierarchy: &DomainHierarchy,
) -> ValidationReport {
    let mut report = ValidationReport::new("Book");
    report.require_text("title", &book.title, MAX_TITLE_LEN);

    // ===== 副本数 =====
    if book.total_copies < 1 {
        report.add("total_copies", "馆藏副本数至少为 1");
    }
    if book.reading_room_copies < 0 {
        report.add("reading_room_copies", "阅览室副本数不能为负");
    } else if book.reading_room_copies > book.total_copies {
        report.add(
            "reading_room_copies",
            format!(
                "阅览室副本数 {} 超过馆藏副本数 {}",
                book.reading_room_copies, book.total_copies
            ),
        );
    }

    // ===== 作者 =====
    if book.author_ids.is_empty() {
        report.add("author_ids", "至少需要一位作者");
    }
    check_duplicates(&mut report, "author_ids", &book.author_ids);
    for id in &book.author_ids {
        if !known_author_ids.contains(id) {
            report.add("author_ids", format!("作者不存在: {}", id));
        }
    }

    // ===== 领域 =====
    if book.domain_ids.is_empty() {
        report.add("domain_ids", "至少需要一个领域");
    }
    check_duplicates(&mut report, "domain_ids", &book.domain_ids);
    for id in &book.domain_ids {
        if !hierarchy.contains(id) {
            report.add("domain_ids", format!("领域不存在: {}", id));
        }
    }
    for (ancestor, descendant) in hierarchy.find_conflicts(&book.domain_ids) {
        report.add(
            "domain_ids",
            format!("领域 {} 是领域 {} 的祖先，不能同时归属", ancestor, descendant),
        );
    }

    report
}

fn check_duplicates(report: &mut ValidationReport, field: &str, ids: &[String]) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for id in ids {
        if !seen.insert(id) && reported.insert(id) {
            report.add(field, format!("重复引用: {}", id));
        }
    }
}

/// 版本校验
///
/// # 规则
/// - publisher 必填
/// - 1450 <= publication_year <= current_year
/// - page_count >= 1
/// - 所属图书必须存在
pub fn validate_edition(edition: &Edition, book_exists: bool, current_year: i32) -> ValidationReport {
    let mut report = ValidationReport::new("Edition");
    report.require_text("publisher", &edition.publisher, MAX_TITLE_LEN);

    if edition.publication_year < MIN_PUBLICATION_YEAR || edition.publication_year > current_year {
        report.add(
            "publication_year",
            format!(
                "出版年份 {} 不在 {}..={} 范围内",
                edition.publication_year, MIN_PUBLICATION_YEAR, current_year
            ),
        );
    }
    if edition.page_count < 1 {
        report.add("page_count", "页数至少为 1");
    }
    if !book_exists {
        report.add("book_id", format!("图书不存在: {}", edition.book_id));
    }
    report
}
