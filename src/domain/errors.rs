use super::{BookValidationError, StockError};

/// 書籍登録のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterBookError {
    /// 入力値が不正
    Invalid(BookValidationError),
}

impl From<BookValidationError> for RegisterBookError {
    fn from(err: BookValidationError) -> Self {
        RegisterBookError::Invalid(err)
    }
}

/// 貸出のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowBookError {
    /// 在庫切れ
    OutOfStock,
}

impl From<StockError> for BorrowBookError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::OutOfStock => BorrowBookError::OutOfStock,
        }
    }
}
