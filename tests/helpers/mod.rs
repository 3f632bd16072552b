// ==========================================
// 集成测试辅助
// ==========================================
// 职责: 临时数据库、Mock 政策配置、测试数据构造
// ==========================================

#![allow(dead_code)]

pub mod mock_config;

use chrono::NaiveDate;
use library_core::api::{AuthorInput, BookInput, ReaderInput};
use library_core::app::LibraryState;
use library_core::domain::{Book, BookDomain, LibraryPolicy, Reader};
use library_core::logging;
use tempfile::NamedTempFile;

pub use mock_config::MockPolicyConfig;

/// 创建临时数据库并组装应用状态
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - LibraryState: 已完成建表的应用状态
pub fn create_test_state() -> (NamedTempFile, LibraryState) {
    logging::init_test();
    let temp_file = NamedTempFile::new().expect("创建临时文件失败");
    let db_path = temp_file.path().to_str().unwrap().to_string();
    let state = LibraryState::new(&db_path).expect("初始化LibraryState失败");
    (temp_file, state)
}

/// 创建临时数据库并写入指定政策
pub fn create_test_state_with_policy(policy: &LibraryPolicy) -> (NamedTempFile, LibraryState) {
    let (file, state) = create_test_state();
    state.config.save_policy(policy).expect("写入政策失败");
    (file, state)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ==========================================
// 测试数据构造
// ==========================================

pub fn add_domain(state: &LibraryState, name: &str, parent: Option<&BookDomain>) -> BookDomain {
    state
        .domain_api
        .create_domain(name, parent.map(|p| p.domain_id.as_str()))
        .expect("创建领域失败")
}

pub fn add_reader(state: &LibraryState, first_name: &str, is_staff: bool) -> Reader {
    state
        .reader_api
        .register_reader(
            ReaderInput {
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                email: Some(format!("{}@library.test", first_name.to_lowercase())),
                is_staff,
                ..Default::default()
            },
            date(2025, 1, 1),
        )
        .expect("注册读者失败")
}

/// 新建图书（自动新建一位作者）
pub fn add_book(
    state: &LibraryState,
    title: &str,
    total_copies: i32,
    reading_room_copies: i32,
    domains: &[&BookDomain],
) -> Book {
    let author = state
        .catalog_api
        .create_author(AuthorInput {
            first_name: "Author".to_string(),
            last_name: title.to_string(),
        })
        .expect("创建作者失败");
    state
        .catalog_api
        .create_book(BookInput {
            title: title.to_string(),
            total_copies,
            reading_room_copies,
            author_ids: vec![author.author_id],
            domain_ids: domains.iter().map(|d| d.domain_id.clone()).collect(),
        })
        .expect("创建图书失败")
}

pub fn ids(books: &[&Book]) -> Vec<String> {
    books.iter().map(|b| b.book_id.clone()).collect()
}
