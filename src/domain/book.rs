use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Author, BookId, BorrowBookError, RegisterBook, RegisterBookError, Stock, Title,
};

/// Book集約 - 在庫台帳が管理する1タイトル分の在庫記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    // 識別子
    pub book_id: BookId,

    // カタログ情報
    pub title: Title,
    pub author: Author,

    // 在庫管理の責務
    pub stock: Stock,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 永続化前の書籍
///
/// IDは在庫台帳が採番するため、登録時点では持たない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: Title,
    pub author: Author,
    pub stock: Stock,
    pub registered_at: DateTime<Utc>,
}

/// 貸出処理のフェーズ
///
/// `Started → Locked → StockDecremented → Priced → Completed`
///
/// `StockDecremented`より前の失敗はトランザクション全体をロールバックし、
/// 在庫に影響を残さない。`Priced`での失敗は価格0.0で`Completed`に到達する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowPhase {
    Started,
    Locked,
    StockDecremented,
    Priced,
    Completed,
}

impl BorrowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowPhase::Started => "started",
            BorrowPhase::Locked => "locked",
            BorrowPhase::StockDecremented => "stock_decremented",
            BorrowPhase::Priced => "priced",
            BorrowPhase::Completed => "completed",
        }
    }

    /// このフェーズで失敗した場合にロールバックが必要か
    ///
    /// 在庫減算がコミットされる前のフェーズのみロールバック対象。
    pub fn rolls_back_on_failure(&self) -> bool {
        matches!(self, BorrowPhase::Started | BorrowPhase::Locked)
    }
}

/// 貸出結果（永続化しない）
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowResult {
    pub book_id: BookId,
    pub title: Title,
    pub stock_left: Stock,
    pub price: f64,
}

/// 純粋関数：書籍を登録する
///
/// ビジネスルール：
/// - タイトルは必須、120文字以内
/// - 著者は必須、80文字以内
/// - 初期在庫は0以上
///
/// タイトルの一意性は在庫台帳が保証する（ここでは検証しない）。
pub fn register_book(cmd: RegisterBook) -> Result<NewBook, RegisterBookError> {
    let title = Title::try_from(cmd.title)?;
    let author = Author::try_from(cmd.author)?;
    let stock = Stock::try_from(cmd.stock)?;

    Ok(NewBook {
        title,
        author,
        stock,
        registered_at: cmd.registered_at,
    })
}

/// 純粋関数：在庫を1冊減らす
///
/// ビジネスルール：
/// - 在庫が0の場合は貸出不可（在庫が負になることはない）
///
/// 副作用なし。新しいBookを返す。ロック下で呼ばれることが前提。
pub fn decrement_stock(
    book: Book,
    borrowed_at: DateTime<Utc>,
) -> Result<Book, BorrowBookError> {
    let stock = book.stock.decrement()?;

    Ok(Book {
        stock,
        updated_at: borrowed_at,
        ..book
    })
}
