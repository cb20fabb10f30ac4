mod common;

use chrono::Utc;
use futures::future::join_all;
use rusty_library_lending::adapters::mock::PricingGateway as MockPricingGateway;
use rusty_library_lending::application::book::{
    BookApplicationError, borrow_book, get_book, list_books, register_book,
};
use rusty_library_lending::domain::{BookId, BorrowBook, RegisterBook};
use rusty_library_lending::ports::PricingError;
use rusty_library_lending::resilience::CircuitState;
use std::sync::Arc;
use std::time::Duration;

fn borrow_cmd(book_id: BookId) -> BorrowBook {
    BorrowBook {
        book_id,
        force_pricing_failure: false,
        borrowed_at: Utc::now(),
    }
}

// ============================================================================
// 在庫の減算
// ============================================================================

#[tokio::test]
async fn test_borrow_decrements_stock_by_one() {
    let (deps, _) = common::deps_with_price(60.0);
    let book = common::seed_book(&deps, "Neuromancer", 3).await;

    let result = borrow_book(&deps, borrow_cmd(book.book_id)).await.unwrap();

    assert_eq!(result.book_id, book.book_id);
    assert_eq!(result.title.as_str(), "Neuromancer");
    assert_eq!(result.stock_left.value(), 2);
    assert_eq!(result.price, 60.0);

    let stored = get_book(&deps, book.book_id).await.unwrap();
    assert_eq!(stored.stock.value(), 2);
}

#[tokio::test]
async fn test_borrow_out_of_stock_leaves_stock_at_zero() {
    let (deps, gateway) = common::deps_with_price(60.0);
    let book = common::seed_book(&deps, "Empty Shelf", 0).await;

    let result = borrow_book(&deps, borrow_cmd(book.book_id)).await;

    assert!(matches!(result, Err(BookApplicationError::OutOfStock)));
    let stored = get_book(&deps, book.book_id).await.unwrap();
    assert_eq!(stored.stock.value(), 0);
    // 在庫切れでは価格サービスを呼ばない
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_borrow_unknown_book_is_not_found() {
    let (deps, _) = common::deps_with_price(60.0);

    let result = borrow_book(&deps, borrow_cmd(BookId::new(999))).await;

    assert!(matches!(result, Err(BookApplicationError::BookNotFound)));
}

#[tokio::test]
async fn test_dune_example() {
    let (deps, _) = common::deps_with_price(55.0);
    let dune = common::seed_book(&deps, "Dune", 1).await;

    let first = borrow_book(&deps, borrow_cmd(dune.book_id)).await.unwrap();
    assert_eq!(first.stock_left.value(), 0);
    assert_eq!(first.price, 55.0);

    let second = borrow_book(&deps, borrow_cmd(dune.book_id)).await;
    assert!(matches!(second, Err(BookApplicationError::OutOfStock)));

    let stored = get_book(&deps, dune.book_id).await.unwrap();
    assert_eq!(stored.stock.value(), 0);
}

// ============================================================================
// 同時貸出
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_are_serialized() {
    let (deps, _) = common::deps_with_price(50.0);
    let stock = 3;
    let borrowers = 10;
    let book = common::seed_book(&deps, "Contended Title", stock).await;

    let handles = (0..borrowers).map(|_| {
        let deps = deps.clone();
        let book_id = book.book_id;
        tokio::spawn(async move { borrow_book(&deps, borrow_cmd(book_id)).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let out_of_stock = results
        .iter()
        .filter(|r| matches!(r, Err(BookApplicationError::OutOfStock)))
        .count();

    assert_eq!(successes, stock as usize);
    assert_eq!(out_of_stock, borrowers - stock as usize);

    // 成功した貸出の残数はすべて異なる（2, 1, 0）
    let mut stock_left: Vec<u32> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|r| r.stock_left.value())
        .collect();
    stock_left.sort_unstable();
    assert_eq!(stock_left, vec![0, 1, 2]);

    let stored = get_book(&deps, book.book_id).await.unwrap();
    assert_eq!(stored.stock.value(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_on_different_books() {
    let (deps, _) = common::deps_with_price(50.0);
    let first = common::seed_book(&deps, "First", 5).await;
    let second = common::seed_book(&deps, "Second", 5).await;

    let handles = (0..10).map(|i| {
        let deps = deps.clone();
        let book_id = if i % 2 == 0 { first.book_id } else { second.book_id };
        tokio::spawn(async move { borrow_book(&deps, borrow_cmd(book_id)).await })
    });
    for joined in join_all(handles).await {
        assert!(joined.unwrap().is_ok());
    }

    assert_eq!(get_book(&deps, first.book_id).await.unwrap().stock.value(), 0);
    assert_eq!(get_book(&deps, second.book_id).await.unwrap().stock.value(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_record_lock_is_released_before_price_lookup() {
    let gateway = Arc::new(MockPricingGateway::with_price(50.0).with_latency(Duration::from_secs(5)));
    let deps = common::in_memory_deps(gateway.clone());
    let book = common::seed_book(&deps, "Slow Pricing", 2).await;

    let borrowing = {
        let deps = deps.clone();
        let book_id = book.book_id;
        tokio::spawn(async move { borrow_book(&deps, borrow_cmd(book_id)).await })
    };

    // 1件目の貸出が価格取得中であることを待つ
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gateway.call_count(), 1);

    // 在庫減算は既にコミットされ、ロックも解放済み
    let mut tx = deps.stock_ledger.begin().await.unwrap();
    let locked = tokio::time::timeout(Duration::from_millis(10), tx.find_for_update(book.book_id))
        .await
        .expect("record lock should not be held during price lookup")
        .unwrap()
        .unwrap();
    assert_eq!(locked.stock.value(), 1);
    tx.rollback().await.unwrap();

    let result = borrowing.await.unwrap().unwrap();
    assert_eq!(result.stock_left.value(), 1);
    assert_eq!(result.price, 50.0);
}

// ============================================================================
// 価格取得の縮退
// ============================================================================

#[tokio::test]
async fn test_forced_pricing_failure_falls_back_to_zero() {
    let (deps, gateway) = common::deps_with_price(75.0);
    let book = common::seed_book(&deps, "Forced Failure", 2).await;

    let cmd = BorrowBook {
        force_pricing_failure: true,
        ..borrow_cmd(book.book_id)
    };
    let result = borrow_book(&deps, cmd).await.unwrap();

    assert_eq!(result.price, 0.0);
    assert_eq!(result.stock_left.value(), 1);
    // 500は一時的な失敗として再試行される（初回 + 2回）
    assert_eq!(gateway.call_count(), 3);

    let stored = get_book(&deps, book.book_id).await.unwrap();
    assert_eq!(stored.stock.value(), 1);
}

#[tokio::test]
async fn test_transient_pricing_failure_is_retried() {
    let (deps, gateway) = common::deps_with_price(65.0);
    gateway.push_failure(PricingError::Timeout);
    let book = common::seed_book(&deps, "Flaky Pricing", 1).await;

    let result = borrow_book(&deps, borrow_cmd(book.book_id)).await.unwrap();

    assert_eq!(result.price, 65.0);
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn test_open_circuit_skips_pricing_but_still_lends() {
    let gateway = Arc::new(MockPricingGateway::always_failing(PricingError::ServerError(503)));
    let deps = common::in_memory_deps(gateway.clone());
    let book = common::seed_book(&deps, "Pricing Down", 5).await;

    // 1件目: 3回失敗、2件目: 2回失敗でOpen（閾値5）、以降は拒否
    for _ in 0..2 {
        let result = borrow_book(&deps, borrow_cmd(book.book_id)).await.unwrap();
        assert_eq!(result.price, 0.0);
    }
    assert_eq!(gateway.call_count(), 5);
    assert_eq!(deps.price_lookup.breaker_state().await, CircuitState::Open);

    let result = borrow_book(&deps, borrow_cmd(book.book_id)).await.unwrap();
    assert_eq!(result.price, 0.0);
    assert_eq!(result.stock_left.value(), 2);
    assert_eq!(gateway.call_count(), 5);
    assert!(deps.price_lookup.breaker_metrics().total_rejections >= 2);
}

// ============================================================================
// カタログ
// ============================================================================

#[tokio::test]
async fn test_duplicate_title_does_not_alter_existing_records() {
    let (deps, _) = common::deps_with_price(50.0);
    let original = common::seed_book(&deps, "Dune", 3).await;

    let result = register_book(
        &deps,
        RegisterBook {
            title: "Dune".to_string(),
            author: "Someone Else".to_string(),
            stock: 9,
            registered_at: Utc::now(),
        },
    )
    .await;

    assert!(matches!(result, Err(BookApplicationError::DuplicateTitle)));

    let books = list_books(&deps).await.unwrap();
    assert_eq!(books, vec![original]);
}

#[tokio::test]
async fn test_register_rejects_invalid_input() {
    let (deps, _) = common::deps_with_price(50.0);

    let result = register_book(
        &deps,
        RegisterBook {
            title: "   ".to_string(),
            author: "Nobody".to_string(),
            stock: 1,
            registered_at: Utc::now(),
        },
    )
    .await;

    assert!(matches!(result, Err(BookApplicationError::InvalidBook(_))));
    assert!(list_books(&deps).await.unwrap().is_empty());
}
