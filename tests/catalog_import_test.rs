// ==========================================
// 馆藏 CSV 导入集成测试
// ==========================================

mod helpers;

use std::io::Write;

use helpers::*;
use library_core::importer::ImportError;
use tempfile::NamedTempFile;

fn write_csv(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_import_mixed_rows() {
    let (_db, state) = create_test_state();
    let today = date(2026, 3, 10);
    let sci = add_domain(&state, "Science", None);
    add_domain(&state, "Physics", Some(&sci));
    add_domain(&state, "Literature", None);

    let csv = write_csv(
        "title,authors,domains,total_copies,reading_room_copies,publisher,publication_year,page_count,book_type\n\
         Cosmos,Carl Sagan,Science,3,1,Random House,1980,396,hardcover\n\
         Relativity,Albert Einstein,physics,2,0,,,,\n\
         Lost,Nobody Known,Astrology,1,0,,,,\n\
         Broken,Carl Sagan,Science;Physics,2,0,,,,\n\
         Future,Carl Sagan,Literature,2,0,Penguin,2999,100,\n\
         Pale Blue Dot,Carl Sagan,Science;Literature,x,0,,,,\n",
    );

    let report = state
        .catalog_importer
        .import_file(csv.path(), today)
        .unwrap();

    assert_eq!(report.total_rows, 6);
    assert_eq!(report.success_count(), 2);
    let failed: Vec<usize> = report.failed_rows.iter().map(|f| f.row_number).collect();
    assert_eq!(failed, vec![4, 5, 6, 7]);

    // 同名作者只新建一次
    assert_eq!(report.created_author_ids.len(), 2);
    assert_eq!(state.catalog_api.list_authors().unwrap().len(), 2);

    let books = state.catalog_api.list_books().unwrap();
    assert_eq!(books.len(), 2);
    let cosmos = books.iter().find(|b| b.title == "Cosmos").unwrap();
    assert_eq!(cosmos.reading_room_copies, 1);
    assert_eq!(state.catalog_api.list_editions(&cosmos.book_id).unwrap().len(), 1);
    let relativity = books.iter().find(|b| b.title == "Relativity").unwrap();
    assert!(state
        .catalog_api
        .list_editions(&relativity.book_id)
        .unwrap()
        .is_empty());
}

#[test]
fn test_import_reuses_existing_authors() {
    let (_db, state) = create_test_state();
    let today = date(2026, 3, 10);
    let lit = add_domain(&state, "Literature", None);
    let existing = add_book(&state, "Persuasion", 2, 0, &[&lit]);
    let author = state.catalog_api.get_author(&existing.author_ids[0]).unwrap();

    let csv = write_csv(&format!(
        "title,authors,domains,total_copies\nSanditon,{} {},Literature,1\n",
        author.first_name, author.last_name
    ));
    let report = state
        .catalog_importer
        .import_file(csv.path(), today)
        .unwrap();

    assert_eq!(report.success_count(), 1);
    assert!(report.created_author_ids.is_empty());
    let imported = state
        .catalog_api
        .get_book(&report.imported_book_ids[0])
        .unwrap();
    assert_eq!(imported.author_ids, vec![author.author_id]);
}

#[test]
fn test_import_missing_required_column() {
    let (_db, state) = create_test_state();
    let csv = write_csv("title,authors,total_copies\nDune,Frank Herbert,2\n");
    let err = state
        .catalog_importer
        .import_file(csv.path(), date(2026, 3, 10))
        .unwrap_err();
    assert!(matches!(err, ImportError::MissingColumn(col) if col == "domains"));
    assert!(state.catalog_api.list_books().unwrap().is_empty());
}

#[test]
fn test_import_same_domain_name_under_two_parents() {
    let (_db, state) = create_test_state();
    let today = date(2026, 3, 10);
    let sci = add_domain(&state, "Science", None);
    let math = add_domain(&state, "Math", None);
    add_domain(&state, "Algorithms", Some(&sci));
    let math_alg = add_domain(&state, "Algorithms", Some(&math));

    let csv = write_csv(
        "title,authors,domains,total_copies\n\
         CLRS,Thomas Cormen,Algorithms,2\n\
         TAOCP,Donald Knuth,math/algorithms,2\n\
         Nowhere,Donald Knuth,Physics/Algorithms,1\n",
    );
    let report = state
        .catalog_importer
        .import_file(csv.path(), today)
        .unwrap();

    assert_eq!(report.success_count(), 1);
    let failed: Vec<usize> = report.failed_rows.iter().map(|f| f.row_number).collect();
    assert_eq!(failed, vec![2, 4]);
    assert!(report.failed_rows[0].reason.contains("不唯一"));
    assert!(report.failed_rows[1].reason.contains("不存在"));

    let imported = state
        .catalog_api
        .get_book(&report.imported_book_ids[0])
        .unwrap();
    assert_eq!(imported.title, "TAOCP");
    assert_eq!(imported.domain_ids, vec![math_alg.domain_id]);
}
