//! PostgreSQL在庫台帳のテスト
//!
//! 実データベースが必要なため既定では無視される。
//! `DATABASE_URL`を設定して`cargo test -- --ignored`で実行する。

mod common;

use chrono::Utc;
use futures::future::join_all;
use rusty_library_lending::adapters::mock::PricingGateway as MockPricingGateway;
use rusty_library_lending::adapters::postgres::PostgresStockLedger;
use rusty_library_lending::application::book::{
    BookApplicationError, ServiceDependencies, borrow_book, get_book,
};
use rusty_library_lending::application::pricing::PriceLookup;
use rusty_library_lending::domain::{Author, BookId, BorrowBook, NewBook, Stock, Title};
use rusty_library_lending::ports::{LedgerError, StockLedger};
use rusty_library_lending::resilience::CircuitBreakerConfig;
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// テストの独立性を保つため、各テスト前にすべての書籍を削除します。
async fn cleanup_database(pool: &PgPool) {
    sqlx::query("TRUNCATE TABLE books RESTART IDENTITY")
        .execute(pool)
        .await
        .expect("Failed to truncate books");
}

async fn setup() -> (PgPool, PostgresStockLedger) {
    let pool = common::create_test_pool().await;
    cleanup_database(&pool).await;
    let ledger = PostgresStockLedger::new(pool.clone());
    (pool, ledger)
}

fn new_book(title: &str, stock: u32) -> NewBook {
    NewBook {
        title: Title::try_from(title.to_string()).unwrap(),
        author: Author::try_from("Test Author".to_string()).unwrap(),
        stock: Stock::new(stock),
        registered_at: Utc::now(),
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_create_and_find() {
    let (_pool, ledger) = setup().await;

    let created = ledger.create(new_book("Dune", 2)).await.unwrap();
    let found = ledger.find_by_id(created.book_id).await.unwrap().unwrap();

    assert_eq!(found.title.as_str(), "Dune");
    assert_eq!(found.stock.value(), 2);
    assert!(ledger.find_by_id(BookId::new(999_999)).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_title_is_rejected() {
    let (_pool, ledger) = setup().await;
    let original = ledger.create(new_book("Dune", 2)).await.unwrap();

    let result = ledger.create(new_book("Dune", 9)).await;

    assert!(matches!(result, Err(LedgerError::DuplicateTitle)));
    let books = ledger.find_all().await.unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].stock, original.stock);
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_commit_persists_and_rollback_discards() {
    let (_pool, ledger) = setup().await;
    let book = ledger.create(new_book("Foundation", 3)).await.unwrap();

    let mut tx = ledger.begin().await.unwrap();
    let mut locked = tx.find_for_update(book.book_id).await.unwrap().unwrap();
    locked.stock = locked.stock.decrement().unwrap();
    tx.save(&locked).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = ledger.begin().await.unwrap();
    let mut locked = tx.find_for_update(book.book_id).await.unwrap().unwrap();
    locked.stock = locked.stock.decrement().unwrap();
    tx.save(&locked).await.unwrap();
    tx.rollback().await.unwrap();

    let stored = ledger.find_by_id(book.book_id).await.unwrap().unwrap();
    assert_eq!(stored.stock.value(), 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_lock_timeout_is_reported() {
    let (pool, _) = setup().await;
    let ledger = PostgresStockLedger::new(pool.clone())
        .with_lock_timeout(Some(Duration::from_millis(100)));
    let book = ledger.create(new_book("Hyperion", 1)).await.unwrap();

    let mut holder = ledger.begin().await.unwrap();
    holder.find_for_update(book.book_id).await.unwrap();

    let mut waiter = ledger.begin().await.unwrap();
    let result = waiter.find_for_update(book.book_id).await;

    assert!(matches!(result, Err(LedgerError::LockTimeout)));
    holder.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_second_lock_waits_for_commit() {
    let (_pool, ledger) = setup().await;
    let ledger = Arc::new(ledger);
    let book = ledger.create(new_book("Dune", 2)).await.unwrap();
    let book_id = book.book_id;

    let mut first = ledger.begin().await.unwrap();
    let mut locked = first.find_for_update(book_id).await.unwrap().unwrap();

    let waiter = {
        let ledger = Arc::clone(&ledger);
        tokio::spawn(async move {
            let mut second = ledger.begin().await.unwrap();
            let seen = second.find_for_update(book_id).await.unwrap().unwrap();
            second.rollback().await.unwrap();
            seen
        })
    };

    // 行ロックが保持されている間、2つ目のトランザクションは待たされる
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished());

    locked.stock = Stock::new(1);
    first.save(&locked).await.unwrap();
    first.commit().await.unwrap();

    let seen = waiter.await.unwrap();
    assert_eq!(seen.stock.value(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_borrows_are_serialized() {
    let (_pool, ledger) = setup().await;
    let stock = 3;
    let borrowers = 10;
    let book = ledger
        .create(new_book("Contended Title", stock as u32))
        .await
        .unwrap();

    let deps = ServiceDependencies {
        stock_ledger: Arc::new(ledger),
        price_lookup: Arc::new(PriceLookup::new(
            Arc::new(MockPricingGateway::with_price(50.0)),
            common::fast_retry(),
            CircuitBreakerConfig::default(),
        )),
    };

    let handles = (0..borrowers).map(|_| {
        let deps = deps.clone();
        let cmd = BorrowBook {
            book_id: book.book_id,
            force_pricing_failure: false,
            borrowed_at: Utc::now(),
        };
        tokio::spawn(async move { borrow_book(&deps, cmd).await })
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

    assert_eq!(successes, stock);
    assert_eq!(out_of_stock, borrowers - stock);

    let stored = get_book(&deps, book.book_id).await.unwrap();
    assert_eq!(stored.stock.value(), 0);
}
