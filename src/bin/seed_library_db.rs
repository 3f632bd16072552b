// ==========================================
// 图书馆借阅管理系统 - 开发库初始化
// ==========================================
// 用法: seed_library_db [db_path] [catalog.csv]
// 旧库存在时先备份再重建
// ==========================================

use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{Duration, Local};

use library_core::api::{AuthorInput, BookInput, BorrowItem, EditionInput, ReaderInput};
use library_core::app::{get_default_db_path, LibraryState};
use library_core::{logging, BookType};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    let catalog_csv = std::env::args().nth(2);

    backup_and_reset_db(&db_path)?;

    let state = LibraryState::new(&db_path)
        .map_err(anyhow::Error::msg)
        .context("初始化应用状态失败")?;

    seed_scenario(&state).await?;

    if let Some(csv_path) = catalog_csv {
        let today = Local::now().date_naive();
        let report = state
            .catalog_importer
            .import_file(Path::new(&csv_path), today)?;
        tracing::info!(
            total = report.total_rows,
            success = report.success_count(),
            failed = report.failure_count(),
            "馆藏 CSV 导入完成"
        );
        for failed in &report.failed_rows {
            eprintln!("  第 {} 行: {}", failed.row_number, failed.reason);
        }
    }

    print_quick_counts(&state)?;
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> anyhow::Result<()> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path).with_context(|| format!("备份 {} 失败", db_path))?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

async fn seed_scenario(state: &LibraryState) -> anyhow::Result<()> {
    let today = Local::now().date_naive();

    // ===== 分类 =====
    let science = state.domain_api.create_domain("科学", None)?;
    let physics = state.domain_api.create_domain("物理", Some(&science.domain_id))?;
    let cs = state.domain_api.create_domain("计算机", Some(&science.domain_id))?;
    let algorithms = state.domain_api.create_domain("算法", Some(&cs.domain_id))?;
    let literature = state.domain_api.create_domain("文学", None)?;
    let history = state.domain_api.create_domain("历史", None)?;

    // ===== 作者 =====
    let author = |first: &str, last: &str| AuthorInput {
        first_name: first.to_string(),
        last_name: last.to_string(),
    };
    let knuth = state.catalog_api.create_author(author("Donald", "Knuth"))?;
    let feynman = state.catalog_api.create_author(author("Richard", "Feynman"))?;
    let austen = state.catalog_api.create_author(author("Jane", "Austen"))?;
    let tuchman = state.catalog_api.create_author(author("Barbara", "Tuchman"))?;

    // ===== 图书 =====
    let book = |title: &str, total: i32, room: i32, author_id: &str, domain_id: &str| BookInput {
        title: title.to_string(),
        total_copies: total,
        reading_room_copies: room,
        author_ids: vec![author_id.to_string()],
        domain_ids: vec![domain_id.to_string()],
    };
    let taocp = state.catalog_api.create_book(book(
        "The Art of Computer Programming",
        6,
        1,
        &knuth.author_id,
        &algorithms.domain_id,
    ))?;
    let lectures = state.catalog_api.create_book(book(
        "The Feynman Lectures on Physics",
        4,
        1,
        &feynman.author_id,
        &physics.domain_id,
    ))?;
    let emma = state
        .catalog_api
        .create_book(book("Emma", 3, 0, &austen.author_id, &literature.domain_id))?;
    let guns = state.catalog_api.create_book(book(
        "The Guns of August",
        2,
        2,
        &tuchman.author_id,
        &history.domain_id,
    ))?;

    let taocp_edition = state.catalog_api.add_edition(
        &taocp.book_id,
        EditionInput {
            publisher: "Addison-Wesley".to_string(),
            publication_year: 1997,
            page_count: 672,
            book_type: BookType::Hardcover,
        },
        today,
    )?;
    state.catalog_api.add_edition(
        &emma.book_id,
        EditionInput {
            publisher: "Penguin Classics".to_string(),
            publication_year: 2003,
            page_count: 474,
            book_type: BookType::Paperback,
        },
        today,
    )?;

    // ===== 读者 =====
    let librarian = state.reader_api.register_reader(
        ReaderInput {
            first_name: "Ana".to_string(),
            last_name: "Popescu".to_string(),
            email: Some("ana.popescu@library.example".to_string()),
            is_staff: true,
            ..Default::default()
        },
        today - Duration::days(365),
    )?;
    let reader = state.reader_api.register_reader(
        ReaderInput {
            first_name: "Mihai".to_string(),
            last_name: "Ionescu".to_string(),
            email: Some("mihai.ionescu@example.com".to_string()),
            phone: Some("+40 721 000 111".to_string()),
            ..Default::default()
        },
        today - Duration::days(90),
    )?;

    // ===== 借阅 =====
    let borrowings = state
        .borrowing_api
        .borrow_items(
            &reader.reader_id,
            &[
                BorrowItem::edition(&taocp.book_id, &taocp_edition.edition_id),
                BorrowItem::book(&emma.book_id),
            ],
            Some(&librarian.reader_id),
            today,
        )
        .await?;
    if let Some(first) = borrowings.first() {
        state
            .borrowing_api
            .extend_borrowing(&first.borrowing_id, 7, today)
            .await?;
    }
    state
        .borrowing_api
        .borrow_books(&librarian.reader_id, &[lectures.book_id.clone()], None, today)
        .await?;

    tracing::info!(guns_book_id = %guns.book_id, "示例数据写入完成");
    Ok(())
}

fn print_quick_counts(state: &LibraryState) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    println!("db_path      = {}", state.db_path);
    println!("domains      = {}", state.domain_api.list_domains()?.len());
    println!("authors      = {}", state.catalog_api.list_authors()?.len());
    println!("books        = {}", state.catalog_api.list_books()?.len());
    println!("readers      = {}", state.reader_api.list_readers()?.len());
    println!("overdue      = {}", state.borrowing_api.list_overdue(today)?.len());
    Ok(())
}
