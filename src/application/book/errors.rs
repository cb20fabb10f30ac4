use crate::domain::BookValidationError;
use crate::ports::LedgerError;
use thiserror::Error;

/// 書籍管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum BookApplicationError {
    /// 同じタイトルの書籍が既に存在する
    #[error("Title already exists")]
    DuplicateTitle,

    /// 書籍が見つからない
    #[error("Book not found")]
    BookNotFound,

    /// 在庫切れ
    #[error("Out of stock")]
    OutOfStock,

    /// 入力値が不正
    #[error("Invalid book: {0}")]
    InvalidBook(BookValidationError),

    /// ロック待機が上限を超えた（再試行可能）
    #[error("Timed out waiting for the book record lock")]
    LockTimeout,

    /// 処理タスクが完了前に中断された
    #[error("Borrow task was interrupted")]
    Interrupted,

    /// 在庫台帳のエラー
    #[error("Stock ledger error")]
    LedgerFailure(#[source] LedgerError),
}

impl From<LedgerError> for BookApplicationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateTitle => BookApplicationError::DuplicateTitle,
            LedgerError::LockTimeout => BookApplicationError::LockTimeout,
            other => BookApplicationError::LedgerFailure(other),
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, BookApplicationError>;
