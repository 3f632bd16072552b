// ==========================================
// 图书馆借阅管理系统 - 馆藏 CSV 批量导入
// ==========================================
// 列: title,authors,domains,total_copies,reading_room_copies,
//     publisher,publication_year,page_count[,book_type]
// authors / domains 以 ; 分隔
// 领域可写作 父领域/子领域 路径，用于区分不同父领域下的同名领域
// ==========================================
// 红线: 每行独立校验，失败行不影响其他行
// 红线: 一行的作者、图书、版本在同一事务内写入
// 红线: 领域必须已存在（按名称匹配），作者按姓名匹配或新建
// ==========================================

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::author::Author;
use crate::domain::book::{Book, Edition};
use crate::domain::types::BookType;
use crate::engine::DomainHierarchy;
use crate::importer::csv_parser::{CsvParser, RawRecord};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::author_repo::AuthorRepository;
use crate::repository::book_repo::BookRepository;
use crate::repository::domain_repo::BookDomainRepository;
use crate::validation::{validate_author, validate_book, validate_edition, ValidationReport};

const REQUIRED_COLUMNS: [&str; 4] = ["title", "authors", "domains", "total_copies"];

// ==========================================
// 导入报告
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRow {
    pub row_number: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogImportReport {
    pub total_rows: usize,
    pub imported_book_ids: Vec<String>,
    pub created_author_ids: Vec<String>,
    pub failed_rows: Vec<FailedRow>,
}

impl CatalogImportReport {
    pub fn success_count(&self) -> usize {
        self.imported_book_ids.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed_rows.len()
    }
}

// ==========================================
// CatalogRow - 一行映射后的数据
// ==========================================
#[derive(Debug, Clone, PartialEq)]
struct CatalogRow {
    row_number: usize,
    title: String,
    authors: Vec<String>,
    domains: Vec<String>,
    total_copies: i32,
    reading_room_copies: i32,
    edition: Option<EditionFields>,
}

#[derive(Debug, Clone, PartialEq)]
struct EditionFields {
    publisher: String,
    publication_year: i32,
    page_count: i32,
    book_type: BookType,
}

// ==========================================
// 字段提取
// ==========================================

fn get_string(row: &HashMap<String, String>, key: &str) -> Option<String> {
    row.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn require_string(row: &HashMap<String, String>, key: &str, row_number: usize) -> ImportResult<String> {
    get_string(row, key).ok_or_else(|| ImportError::FieldMissing {
        row: row_number,
        field: key.to_string(),
    })
}

fn parse_i32(row: &HashMap<String, String>, key: &str, row_number: usize) -> ImportResult<Option<i32>> {
    match get_string(row, key) {
        None => Ok(None),
        Some(value) => value
            .parse::<i32>()
            .map(Some)
            .map_err(|_| ImportError::TypeConversionError {
                row: row_number,
                field: key.to_string(),
                message: format!("无法解析为整数: {}", value),
            }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// "名 姓" → (名, 姓)；以最后一个空白分隔
fn split_author_name(full_name: &str, row_number: usize) -> ImportResult<(String, String)> {
    match full_name.trim().rsplit_once(char::is_whitespace) {
        Some((first, last)) if !first.trim().is_empty() && !last.is_empty() => {
            Ok((first.trim().to_string(), last.to_string()))
        }
        _ => Err(ImportError::InvalidAuthorName {
            row: row_number,
            name: full_name.to_string(),
        }),
    }
}

fn map_row(row_number: usize, row: &HashMap<String, String>) -> ImportResult<CatalogRow> {
    let title = require_string(row, "title", row_number)?;
    let authors = split_list(&require_string(row, "authors", row_number)?);
    let domains = split_list(&require_string(row, "domains", row_number)?);
    let total_copies = parse_i32(row, "total_copies", row_number)?.ok_or_else(|| {
        ImportError::FieldMissing {
            row: row_number,
            field: "total_copies".to_string(),
        }
    })?;
    let reading_room_copies = parse_i32(row, "reading_room_copies", row_number)?.unwrap_or(0);

    // 版本列全部为空时不建版本
    let publisher = get_string(row, "publisher");
    let year = parse_i32(row, "publication_year", row_number)?;
    let pages = parse_i32(row, "page_count", row_number)?;
    let edition = match (publisher, year, pages) {
        (None, None, None) => None,
        (publisher, year, pages) => {
            let book_type = match get_string(row, "book_type") {
                None => BookType::Paperback,
                Some(raw) => BookType::from_str(&raw).ok_or_else(|| {
                    ImportError::TypeConversionError {
                        row: row_number,
                        field: "book_type".to_string(),
                        message: format!("未知图书类型: {}", raw),
                    }
                })?,
            };
            Some(EditionFields {
                publisher: publisher.unwrap_or_default(),
                publication_year: year.unwrap_or(0),
                page_count: pages.unwrap_or(0),
                book_type,
            })
        }
    };

    Ok(CatalogRow {
        row_number,
        title,
        authors,
        domains,
        total_copies,
        reading_room_copies,
        edition,
    })
}

fn report_to_error(report: ValidationReport, row_number: usize) -> ImportResult<()> {
    if report.is_valid() {
        Ok(())
    } else {
        Err(ImportError::ValidationError {
            row: row_number,
            message: report.summary(),
        })
    }
}

// ==========================================
// CatalogCsvImporter - 馆藏导入器
// ==========================================
pub struct CatalogCsvImporter {
    author_repo: Arc<AuthorRepository>,
    book_repo: Arc<BookRepository>,
    domain_repo: Arc<BookDomainRepository>,
}

impl CatalogCsvImporter {
    pub fn new(
        author_repo: Arc<AuthorRepository>,
        book_repo: Arc<BookRepository>,
        domain_repo: Arc<BookDomainRepository>,
    ) -> Self {
        Self {
            author_repo,
            book_repo,
            domain_repo,
        }
    }

    /// 从文件导入
    pub fn import_file(&self, path: &Path, today: NaiveDate) -> ImportResult<CatalogImportReport> {
        info!(path = %path.display(), "开始导入馆藏 CSV");
        let records = CsvParser::parse_file(path)?;
        self.import_records(&records, today)
    }

    /// 从已解析的记录导入
    ///
    /// # 返回
    /// - Err: 缺少必需列（整个文件无法导入）
    /// - Ok(report): 每行的成功/失败明细
    pub fn import_records(
        &self,
        records: &[RawRecord],
        today: NaiveDate,
    ) -> ImportResult<CatalogImportReport> {
        if let Some((_, first)) = records.first() {
            for col in REQUIRED_COLUMNS {
                if !first.contains_key(col) {
                    return Err(ImportError::MissingColumn(col.to_string()));
                }
            }
        }

        let hierarchy = DomainHierarchy::new(self.domain_repo.list_all()?);
        let mut report = CatalogImportReport {
            total_rows: records.len(),
            ..Default::default()
        };

        for (row_number, row) in records {
            match self.import_row(*row_number, row, &hierarchy, today, &mut report) {
                Ok(book_id) => report.imported_book_ids.push(book_id),
                Err(e) => {
                    warn!(row = row_number, error = %e, "馆藏导入行失败");
                    report.failed_rows.push(FailedRow {
                        row_number: *row_number,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            total = report.total_rows,
            imported = report.success_count(),
            failed = report.failure_count(),
            "馆藏 CSV 导入完成"
        );
        Ok(report)
    }

    /// 解析领域引用
    ///
    /// # 规则
    /// - "算法" 按名称匹配（忽略大小写）
    /// - "科学/算法" 要求从最近的父领域起逐级匹配路径中的前缀
    /// - 无匹配 → UnknownDomain；多于一个 → AmbiguousDomain
    fn resolve_domain(
        &self,
        row_number: usize,
        reference: &str,
        hierarchy: &DomainHierarchy,
    ) -> ImportResult<String> {
        let segments: Vec<&str> = reference
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(ImportError::UnknownDomain {
                row: row_number,
                name: reference.to_string(),
            });
        };

        let matches: Vec<String> = self
            .domain_repo
            .find_all_by_name(leaf)?
            .into_iter()
            .filter(|candidate| {
                let ancestors = hierarchy.ancestors(&candidate.domain_id);
                parents.len() <= ancestors.len()
                    && parents.iter().rev().zip(&ancestors).all(|(expected, id)| {
                        hierarchy
                            .get(id)
                            .map(|d| d.name.eq_ignore_ascii_case(expected))
                            .unwrap_or(false)
                    })
            })
            .map(|d| d.domain_id)
            .collect();

        match matches.as_slice() {
            [single] => Ok(single.clone()),
            [] => Err(ImportError::UnknownDomain {
                row: row_number,
                name: reference.to_string(),
            }),
            _ => Err(ImportError::AmbiguousDomain {
                row: row_number,
                name: reference.to_string(),
            }),
        }
    }

    /// 单行导入: 映射 → 解析领域/作者 → 校验 → 写入
    fn import_row(
        &self,
        row_number: usize,
        row: &HashMap<String, String>,
        hierarchy: &DomainHierarchy,
        today: NaiveDate,
        report: &mut CatalogImportReport,
    ) -> ImportResult<String> {
        let mapped = map_row(row_number, row)?;

        // === 领域: 按名称（或 父/子 路径）匹配已有领域 ===
        let mut domain_ids = Vec::with_capacity(mapped.domains.len());
        for name in &mapped.domains {
            domain_ids.push(self.resolve_domain(row_number, name, hierarchy)?);
        }

        // === 作者: 按姓名匹配，未匹配的暂存待建 ===
        let mut author_ids = Vec::with_capacity(mapped.authors.len());
        let mut new_authors = Vec::new();
        for full_name in &mapped.authors {
            let (first, last) = split_author_name(full_name, row_number)?;
            if let Some(staged) = new_authors
                .iter()
                .find(|a: &&Author| a.first_name == first && a.last_name == last)
            {
                author_ids.push(staged.author_id.clone());
                continue;
            }
            match self.author_repo.find_by_name(&first, &last)? {
                Some(existing) => author_ids.push(existing.author_id),
                None => {
                    let author = Author {
                        author_id: Uuid::new_v4().to_string(),
                        first_name: first,
                        last_name: last,
                    };
                    report_to_error(validate_author(&author), row_number)?;
                    author_ids.push(author.author_id.clone());
                    new_authors.push(author);
                }
            }
        }

        // === 校验图书与版本 ===
        let book = Book {
            book_id: Uuid::new_v4().to_string(),
            title: mapped.title,
            total_copies: mapped.total_copies,
            reading_room_copies: mapped.reading_room_copies,
            author_ids,
            domain_ids,
        };
        let known_authors: HashSet<String> = book.author_ids.iter().cloned().collect();
        report_to_error(validate_book(&book, &known_authors, hierarchy), row_number)?;

        let edition = mapped.edition.map(|e| Edition {
            edition_id: Uuid::new_v4().to_string(),
            book_id: book.book_id.clone(),
            publisher: e.publisher,
            publication_year: e.publication_year,
            page_count: e.page_count,
            book_type: e.book_type,
        });
        if let Some(e) = &edition {
            report_to_error(validate_edition(e, true, today.year()), row_number)?;
        }

        // === 写入（单事务） ===
        self.book_repo
            .insert_catalog_entry(&new_authors, &book, edition.as_ref())?;
        report
            .created_author_ids
            .extend(new_authors.into_iter().map(|a| a.author_id));

        Ok(book.book_id)
    }
}
