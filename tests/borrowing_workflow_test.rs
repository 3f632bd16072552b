// ==========================================
// 借阅业务集成测试
// ==========================================
// 覆盖: 借出(全有或全无)、归还、续借、逾期、各类政策额度
// ==========================================

mod helpers;

use std::sync::Arc;

use chrono::Duration;
use helpers::*;
use library_core::api::{ApiError, BorrowItem, BorrowingApi, EditionInput};
use library_core::domain::{BookType, LibraryPolicy, PolicyRule, PolicyViolation};
use library_core::repository::{
    BookDomainRepository, BookRepository, BorrowingRepository, EditionRepository,
    ReaderRepository,
};

fn rules_of(err: ApiError) -> Vec<PolicyViolation> {
    match err {
        ApiError::PolicyViolation { violations, .. } => violations,
        other => panic!("期望 PolicyViolation，实际: {:?}", other),
    }
}

fn has_rule(violations: &[PolicyViolation], rule: PolicyRule) -> bool {
    violations.iter().any(|v| v.rule == rule)
}

#[tokio::test]
async fn test_borrow_is_all_or_nothing() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let lit = add_domain(&state, "文学", None);
    let librarian = add_reader(&state, "Lib", true);
    let reader = add_reader(&state, "Reader", false);
    let lendable = add_book(&state, "Compilers", 3, 0, &[&cs]);
    let room_only = add_book(&state, "Odyssey", 2, 2, &[&lit]);

    let err = state
        .borrowing_api
        .borrow_books(
            &reader.reader_id,
            &ids(&[&lendable, &room_only]),
            Some(&librarian.reader_id),
            today,
        )
        .await
        .unwrap_err();
    let violations = rules_of(err);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule, PolicyRule::ReadingRoomOnly);
    assert_eq!(violations[0].book_id.as_deref(), Some(room_only.book_id.as_str()));
    assert!(state
        .borrowing_api
        .list_active_borrowings(&reader.reader_id)
        .unwrap()
        .is_empty());

    let borrowings = state
        .borrowing_api
        .borrow_books(
            &reader.reader_id,
            &ids(&[&lendable]),
            Some(&librarian.reader_id),
            today,
        )
        .await
        .unwrap();
    assert_eq!(borrowings.len(), 1);
    assert_eq!(borrowings[0].due_date, today + Duration::days(14));
    assert_eq!(borrowings[0].lent_by.as_deref(), Some(librarian.reader_id.as_str()));

    let availability = state.catalog_api.book_availability(&lendable.book_id).unwrap();
    assert_eq!(availability.active_loans, 1);
    assert_eq!(availability.available_copies, 2);
}

#[tokio::test]
async fn test_empty_request_and_unknown_book() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let reader = add_reader(&state, "Empty", false);

    let err = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &[], None, today)
        .await
        .unwrap_err();
    let violations = rules_of(err);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule, PolicyRule::EmptyRequest);

    let err = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &["missing".to_string()], None, today)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_check_eligibility_does_not_persist() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let reader = add_reader(&state, "Dry", false);
    let book = add_book(&state, "Dragon", 2, 0, &[&cs]);

    let decision = state
        .borrowing_api
        .check_eligibility(&reader.reader_id, &ids(&[&book]), None, today)
        .await
        .unwrap();
    assert!(decision.approved);
    assert!(state
        .borrowing_api
        .list_reader_history(&reader.reader_id)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_return_flow() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let reader = add_reader(&state, "Returner", false);
    let book = add_book(&state, "Networks", 2, 0, &[&cs]);

    let borrowing = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&book]), None, today)
        .await
        .unwrap()
        .remove(0);

    let err = state
        .borrowing_api
        .return_book(&borrowing.borrowing_id, today - Duration::days(1))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let returned = state
        .borrowing_api
        .return_book(&borrowing.borrowing_id, today + Duration::days(3))
        .unwrap();
    assert!(!returned.is_active);
    assert_eq!(returned.returned_on, Some(today + Duration::days(3)));

    let err = state
        .borrowing_api
        .return_book(&borrowing.borrowing_id, today + Duration::days(4))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));

    let availability = state.catalog_api.book_availability(&book.book_id).unwrap();
    assert_eq!(availability.active_loans, 0);
    assert_eq!(
        state
            .borrowing_api
            .list_reader_history(&reader.reader_id)
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_extension_limit_and_returned_loan() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let reader = add_reader(&state, "Extender", false);
    let book = add_book(&state, "Databases", 2, 0, &[&cs]);

    let borrowing = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&book]), None, today)
        .await
        .unwrap()
        .remove(0);
    let id = borrowing.borrowing_id.as_str();

    let err = state.borrowing_api.extend_borrowing(id, 0, today).await.unwrap_err();
    assert!(matches!(err, ApiError::ValidationFailed { .. }));

    let first = state.borrowing_api.extend_borrowing(id, 10, today).await.unwrap();
    assert_eq!(first.new_due_date, borrowing.due_date + Duration::days(10));

    // 默认上限 14 天: 10 + 5 超限
    let err = state.borrowing_api.extend_borrowing(id, 5, today).await.unwrap_err();
    assert!(has_rule(&rules_of(err), PolicyRule::ExtensionLimit));

    let second = state.borrowing_api.extend_borrowing(id, 4, today).await.unwrap();
    assert_eq!(second.new_due_date, borrowing.due_date + Duration::days(14));
    assert_eq!(state.borrowing_api.list_extensions(id).unwrap().len(), 2);

    let active = state
        .borrowing_api
        .list_active_borrowings(&reader.reader_id)
        .unwrap();
    assert_eq!(active[0].due_date, borrowing.due_date + Duration::days(14));
    assert_eq!(active[0].extension_count, 2);
    assert_eq!(active[0].total_extension_days, 14);

    state
        .borrowing_api
        .return_book(id, today + Duration::days(1))
        .unwrap();
    let err = state
        .borrowing_api
        .extend_borrowing(id, 1, today + Duration::days(1))
        .await
        .unwrap_err();
    assert!(has_rule(&rules_of(err), PolicyRule::BorrowingNotActive));
}

#[tokio::test]
async fn test_overdue_listing() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let reader = add_reader(&state, "Late", false);
    let book = add_book(&state, "Graphics", 2, 0, &[&cs]);

    state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&book]), None, today)
        .await
        .unwrap();

    assert!(state
        .borrowing_api
        .list_overdue(today + Duration::days(14))
        .unwrap()
        .is_empty());
    let overdue = state
        .borrowing_api
        .list_overdue(today + Duration::days(15))
        .unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].overdue_days(today + Duration::days(15)), 1);
}

#[tokio::test]
async fn test_period_quota_across_requests() {
    let policy = LibraryPolicy {
        max_books_per_period: 2,
        ..LibraryPolicy::default()
    };
    let (_file, state) = create_test_state_with_policy(&policy);
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let lit = add_domain(&state, "文学", None);
    let hist = add_domain(&state, "历史", None);
    let reader = add_reader(&state, "Quota", false);
    let x = add_book(&state, "Algorithms", 2, 0, &[&cs]);
    let y = add_book(&state, "Hamlet", 2, 0, &[&lit]);
    let z = add_book(&state, "Rome", 2, 0, &[&hist]);

    state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&x, &y]), None, today)
        .await
        .unwrap();

    let err = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&z]), None, today + Duration::days(1))
        .await
        .unwrap_err();
    assert!(has_rule(&rules_of(err), PolicyRule::PeriodQuota));
}

#[tokio::test]
async fn test_returned_loan_still_counts_after_delete_attempt() {
    let policy = LibraryPolicy {
        max_books_per_period: 1,
        ..LibraryPolicy::default()
    };
    let (_file, state) = create_test_state_with_policy(&policy);
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let lit = add_domain(&state, "文学", None);
    let reader = add_reader(&state, "Quota", false);
    let first = add_book(&state, "Compilers", 2, 0, &[&cs]);
    let second = add_book(&state, "Hamlet", 2, 0, &[&lit]);

    let loan = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&first]), None, today)
        .await
        .unwrap()
        .remove(0);
    state
        .borrowing_api
        .return_book(&loan.borrowing_id, today + Duration::days(1))
        .unwrap();

    assert!(matches!(
        state.catalog_api.delete_book(&first.book_id),
        Err(ApiError::BusinessRuleViolation(_))
    ));
    assert_eq!(
        state
            .borrowing_api
            .list_reader_history(&reader.reader_id)
            .unwrap()
            .len(),
        1
    );

    let decision = state
        .borrowing_api
        .check_eligibility(
            &reader.reader_id,
            &ids(&[&second]),
            None,
            today + Duration::days(2),
        )
        .await
        .unwrap();
    assert!(!decision.approved);
    assert!(has_rule(&decision.violations, PolicyRule::PeriodQuota));
}

#[tokio::test]
async fn test_domain_quota_counts_ancestor_domains() {
    let policy = LibraryPolicy {
        max_books_per_domain: 1,
        ..LibraryPolicy::default()
    };
    let (_file, state) = create_test_state_with_policy(&policy);
    let today = date(2026, 3, 10);
    let sci = add_domain(&state, "科学", None);
    let cs = add_domain(&state, "计算机", Some(&sci));
    let alg = add_domain(&state, "算法", Some(&cs));
    let db = add_domain(&state, "数据库", Some(&cs));
    let reader = add_reader(&state, "Domain", false);
    let first = add_book(&state, "Sorting", 2, 0, &[&alg]);
    let second = add_book(&state, "Indexing", 2, 0, &[&db]);

    state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&first]), None, today)
        .await
        .unwrap();

    let err = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&second]), None, today + Duration::days(1))
        .await
        .unwrap_err();
    assert!(has_rule(&rules_of(err), PolicyRule::DomainQuota));
}

#[tokio::test]
async fn test_diversity_required_for_large_requests() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let reader = add_reader(&state, "Narrow", false);
    let a = add_book(&state, "Rust", 2, 0, &[&cs]);
    let b = add_book(&state, "Go", 2, 0, &[&cs]);
    let c = add_book(&state, "Zig", 2, 0, &[&cs]);

    let err = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&a, &b, &c]), None, today)
        .await
        .unwrap_err();
    assert!(has_rule(&rules_of(err), PolicyRule::DomainDiversity));
}

#[tokio::test]
async fn test_reborrow_interval() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let reader = add_reader(&state, "Again", false);
    let book = add_book(&state, "Kernels", 2, 0, &[&cs]);

    let borrowing = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&book]), None, today)
        .await
        .unwrap()
        .remove(0);
    state
        .borrowing_api
        .return_book(&borrowing.borrowing_id, today + Duration::days(1))
        .unwrap();

    let err = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&book]), None, today + Duration::days(5))
        .await
        .unwrap_err();
    assert!(has_rule(&rules_of(err), PolicyRule::ReborrowInterval));

    // 间隔恰好 14 天即可再借
    state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&book]), None, today + Duration::days(14))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_lender_rules() {
    let policy = LibraryPolicy {
        max_loans_served_per_day: 1,
        ..LibraryPolicy::default()
    };
    let (_file, state) = create_test_state_with_policy(&policy);
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let librarian = add_reader(&state, "Staff", true);
    let first = add_reader(&state, "First", false);
    let second = add_reader(&state, "Second", false);
    let book = add_book(&state, "Shells", 5, 0, &[&cs]);

    let err = state
        .borrowing_api
        .borrow_books(&first.reader_id, &ids(&[&book]), Some(&second.reader_id), today)
        .await
        .unwrap_err();
    assert!(has_rule(&rules_of(err), PolicyRule::LenderNotStaff));

    let err = state
        .borrowing_api
        .borrow_books(
            &librarian.reader_id,
            &ids(&[&book]),
            Some(&librarian.reader_id),
            today,
        )
        .await
        .unwrap_err();
    assert!(has_rule(&rules_of(err), PolicyRule::SelfLending));

    state
        .borrowing_api
        .borrow_books(&first.reader_id, &ids(&[&book]), Some(&librarian.reader_id), today)
        .await
        .unwrap();
    let err = state
        .borrowing_api
        .borrow_books(&second.reader_id, &ids(&[&book]), Some(&librarian.reader_id), today)
        .await
        .unwrap_err();
    assert!(has_rule(&rules_of(err), PolicyRule::LenderDailyQuota));
}

#[tokio::test]
async fn test_staff_limits_are_multiplied() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let lit = add_domain(&state, "文学", None);
    let staff = add_reader(&state, "Keeper", true);
    let reader = add_reader(&state, "Visitor", false);
    let books: Vec<_> = (0..6)
        .map(|i| {
            let domain = if i % 2 == 0 { &cs } else { &lit };
            add_book(&state, &format!("Volume{}", i), 3, 0, &[domain])
        })
        .collect();
    let book_ids: Vec<String> = books.iter().map(|b| b.book_id.clone()).collect();

    let borrowed = state
        .borrowing_api
        .borrow_books(&staff.reader_id, &book_ids, None, today)
        .await
        .unwrap();
    assert_eq!(borrowed.len(), 6);

    let err = state
        .borrowing_api
        .borrow_books(&reader.reader_id, &book_ids, None, today)
        .await
        .unwrap_err();
    let violations = rules_of(err);
    assert!(has_rule(&violations, PolicyRule::RequestSize));
    assert!(has_rule(&violations, PolicyRule::DailyQuota));
}

#[tokio::test]
async fn test_all_violations_reported_with_mock_policy() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let reader = add_reader(&state, "Mocked", false);
    let a = add_book(&state, "Lisp", 2, 0, &[&cs]);
    let b = add_book(&state, "Scheme", 2, 0, &[&cs]);

    let api = BorrowingApi::new(
        Arc::new(MockPolicyConfig::strict()),
        Arc::new(ReaderRepository::from_connection(state.conn.clone())),
        Arc::new(BookRepository::from_connection(state.conn.clone())),
        Arc::new(EditionRepository::from_connection(state.conn.clone())),
        Arc::new(BookDomainRepository::from_connection(state.conn.clone())),
        Arc::new(BorrowingRepository::from_connection(state.conn.clone())),
    );

    let decision = api
        .check_eligibility(&reader.reader_id, &ids(&[&a, &b]), None, today)
        .await
        .unwrap();
    assert!(!decision.approved);
    assert!(has_rule(&decision.violations, PolicyRule::DomainQuota));
    assert!(has_rule(&decision.violations, PolicyRule::DomainDiversity));

    // 同一请求在默认政策下可以借出
    state
        .borrowing_api
        .borrow_books(&reader.reader_id, &ids(&[&a, &b]), None, today)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_requests_for_last_copy() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let first = add_reader(&state, "Early", false);
    let second = add_reader(&state, "Late", false);
    let book = add_book(&state, "Last Copy", 1, 0, &[&cs]);
    let book_ids = ids(&[&book]);

    let (a, b) = tokio::join!(
        state
            .borrowing_api
            .borrow_books(&first.reader_id, &book_ids, None, today),
        state
            .borrowing_api
            .borrow_books(&second.reader_id, &book_ids, None, today),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let err = outcomes
        .into_iter()
        .find_map(|r| r.err())
        .unwrap();
    assert!(has_rule(&rules_of(err), PolicyRule::AvailabilityThreshold));
    assert_eq!(
        state
            .catalog_api
            .book_availability(&book.book_id)
            .unwrap()
            .active_loans,
        1
    );
}

#[tokio::test]
async fn test_borrow_specific_edition() {
    let (_file, state) = create_test_state();
    let today = date(2026, 3, 10);
    let cs = add_domain(&state, "计算机", None);
    let reader = add_reader(&state, "Collector", false);
    let dragon = add_book(&state, "Compilers", 2, 0, &[&cs]);
    let other = add_book(&state, "Linkers", 2, 0, &[&cs]);
    let edition_of = |book_id: &str, year: i32| {
        state
            .catalog_api
            .add_edition(
                book_id,
                EditionInput {
                    publisher: "Addison-Wesley".to_string(),
                    publication_year: year,
                    page_count: 1000,
                    book_type: BookType::Hardcover,
                },
                today,
            )
            .unwrap()
    };
    let second_edition = edition_of(&dragon.book_id, 2006);
    let foreign = edition_of(&other.book_id, 1999);

    let err = state
        .borrowing_api
        .borrow_items(
            &reader.reader_id,
            &[BorrowItem::edition(&dragon.book_id, &foreign.edition_id)],
            None,
            today,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = state
        .borrowing_api
        .borrow_items(
            &reader.reader_id,
            &[BorrowItem::edition(&dragon.book_id, "missing")],
            None,
            today,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert!(state
        .borrowing_api
        .list_active_borrowings(&reader.reader_id)
        .unwrap()
        .is_empty());

    let loans = state
        .borrowing_api
        .borrow_items(
            &reader.reader_id,
            &[
                BorrowItem::edition(&dragon.book_id, &second_edition.edition_id),
                BorrowItem::book(&other.book_id),
            ],
            None,
            today,
        )
        .await
        .unwrap();
    assert_eq!(loans[0].edition_id.as_deref(), Some(second_edition.edition_id.as_str()));
    assert_eq!(loans[1].edition_id, None);

    let stored = state
        .borrowing_api
        .list_active_borrowings(&reader.reader_id)
        .unwrap();
    let stored_dragon = stored.iter().find(|b| b.book_id == dragon.book_id).unwrap();
    assert_eq!(stored_dragon.edition_id, Some(second_edition.edition_id.clone()));

    // 删除版本后借阅仍保留，只是不再指向版本
    state
        .catalog_api
        .delete_edition(&second_edition.edition_id)
        .unwrap();
    let after = state
        .borrowing_api
        .list_reader_history(&reader.reader_id)
        .unwrap();
    assert_eq!(after.len(), 2);
    assert!(after.iter().all(|b| b.edition_id.is_none()));
}
