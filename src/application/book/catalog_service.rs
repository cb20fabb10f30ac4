use crate::domain::{self, Book, BookId, RegisterBook, RegisterBookError};

use super::borrow_service::ServiceDependencies;
use super::errors::{BookApplicationError, Result};

/// 全書籍を取得する
pub async fn list_books(deps: &ServiceDependencies) -> Result<Vec<Book>> {
    tracing::info!("Fetching all books from the ledger.");
    Ok(deps.stock_ledger.find_all().await?)
}

/// IDで書籍を取得する
pub async fn get_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    deps.stock_ledger
        .find_by_id(book_id)
        .await?
        .ok_or(BookApplicationError::BookNotFound)
}

/// 書籍を登録する
///
/// ビジネスルール：
/// - 入力値はドメイン層で検証する（タイトル・著者・在庫）
/// - タイトルはカタログ内で一意（在庫台帳が保証）
///
/// 重複時は既存レコードを一切変更しない。
pub async fn register_book(deps: &ServiceDependencies, cmd: RegisterBook) -> Result<Book> {
    tracing::info!("Creating new book: {}", cmd.title);

    // 1. ドメイン層で検証
    let new_book = domain::book::register_book(cmd).map_err(|e| match e {
        RegisterBookError::Invalid(reason) => BookApplicationError::InvalidBook(reason),
    })?;

    // 2. 在庫台帳に登録（タイトル重複はここで検出）
    let book = deps.stock_ledger.create(new_book).await.map_err(|e| {
        let err = BookApplicationError::from(e);
        if matches!(err, BookApplicationError::DuplicateTitle) {
            tracing::warn!("Attempted to create book with existing title");
        }
        err
    })?;

    tracing::info!(book_id = %book.book_id, "Book registered");
    Ok(book)
}
