use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::pricing::PriceLookup;
use crate::domain::{Book, BorrowResult, RegisterBook};
use crate::resilience::CircuitBreakerMetrics;

/// 書籍登録リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub stock: i64,
}

impl CreateBookRequest {
    pub fn to_command(self, registered_at: DateTime<Utc>) -> RegisterBook {
        RegisterBook {
            title: self.title,
            author: self.author,
            stock: self.stock,
            registered_at,
        }
    }
}

/// 書籍レスポンス（GET /api/books, GET /api/books/:id, POST /api/books）
#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub stock: u32,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.book_id.value(),
            title: book.title.as_str().to_string(),
            author: book.author.as_str().to_string(),
            stock: book.stock.value(),
        }
    }
}

/// 貸出クエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct BorrowQuery {
    /// trueの場合、価格サービスを強制的に失敗させる
    pub fail: Option<bool>,
}

/// 貸出レスポンス
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowResponse {
    pub id: i64,
    pub title: String,
    pub stock_left: u32,
    pub price: f64,
}

impl From<BorrowResult> for BorrowResponse {
    fn from(result: BorrowResult) -> Self {
        Self {
            id: result.book_id.value(),
            title: result.title.as_str().to_string(),
            stock_left: result.stock_left.value(),
            price: result.price,
        }
    }
}

/// サーキットブレーカーの状態（GET /api/debug/circuit-breaker）
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerResponse {
    pub state: String,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

impl CircuitBreakerResponse {
    pub async fn snapshot(price_lookup: &PriceLookup) -> Self {
        let state = price_lookup.breaker_state().await;
        let CircuitBreakerMetrics {
            total_calls,
            total_successes,
            total_failures,
            total_rejections,
        } = price_lookup.breaker_metrics();

        Self {
            state: state.as_str().to_string(),
            total_calls,
            total_successes,
            total_failures,
            total_rejections,
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
