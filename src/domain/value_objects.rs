use serde::{Deserialize, Serialize};
use std::fmt;

/// タイトルの最大文字数
pub const TITLE_MAX_LEN: usize = 120;

/// 著者名の最大文字数
pub const AUTHOR_MAX_LEN: usize = 80;

/// 在庫数の上限（在庫台帳の`INTEGER`列に収まる値）
pub const STOCK_MAX: u32 = i32::MAX as u32;

/// 書籍ID - 在庫台帳が採番する識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookId(i64);

impl BookId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 値オブジェクトの検証エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookValidationError {
    #[error("Title must not be blank")]
    BlankTitle,

    #[error("Title must be at most 120 characters")]
    TitleTooLong,

    #[error("Author must not be blank")]
    BlankAuthor,

    #[error("Author must be at most 80 characters")]
    AuthorTooLong,

    #[error("Stock must not be negative")]
    NegativeStock,

    #[error("Stock must be at most 2147483647")]
    StockTooLarge,
}

/// 書籍タイトル
///
/// 不変条件：空白のみ不可、120文字以内。カタログ内で一意。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Title(String);

impl Title {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Title {
    type Error = BookValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(BookValidationError::BlankTitle);
        }
        if value.chars().count() > TITLE_MAX_LEN {
            return Err(BookValidationError::TitleTooLong);
        }
        Ok(Self(value))
    }
}

impl From<Title> for String {
    fn from(title: Title) -> Self {
        title.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 著者名
///
/// 不変条件：空白のみ不可、80文字以内。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Author(String);

impl Author {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Author {
    type Error = BookValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(BookValidationError::BlankAuthor);
        }
        if value.chars().count() > AUTHOR_MAX_LEN {
            return Err(BookValidationError::AuthorTooLong);
        }
        Ok(Self(value))
    }
}

impl From<Author> for String {
    fn from(author: Author) -> Self {
        author.0
    }
}

/// 在庫エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    /// 在庫切れ
    #[error("Out of stock")]
    OutOfStock,
}

/// 在庫数
///
/// 不変条件：在庫は0以上、`STOCK_MAX`以下。
/// 符号なし整数で保持し、0からの減算は`StockError::OutOfStock`として拒否する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stock(u32);

impl Stock {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// 在庫を1減らす
    ///
    /// # エラー
    /// 在庫が0の場合は`StockError::OutOfStock`を返す
    pub fn decrement(self) -> Result<Self, StockError> {
        self.0
            .checked_sub(1)
            .map(Self)
            .ok_or(StockError::OutOfStock)
    }

    /// 現在の在庫数
    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i64> for Stock {
    type Error = BookValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(BookValidationError::NegativeStock);
        }
        if value > i64::from(STOCK_MAX) {
            return Err(BookValidationError::StockTooLarge);
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| BookValidationError::StockTooLarge)
    }
}
