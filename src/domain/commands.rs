use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BookId;

/// コマンド：書籍を登録する
///
/// 入力値は未検証のまま保持し、`domain::book::register_book`で検証する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBook {
    pub title: String,
    pub author: String,
    pub stock: i64,
    pub registered_at: DateTime<Utc>,
}

/// コマンド：書籍を1冊貸し出す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowBook {
    pub book_id: BookId,
    /// 価格サービスへ`fail=true`を伝播し、強制的に失敗させる（縮退動作の確認用）
    pub force_pricing_failure: bool,
    pub borrowed_at: DateTime<Utc>,
}
