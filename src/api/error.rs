use crate::application::book::BookApplicationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub struct ApiError(BookApplicationError);

impl From<BookApplicationError> for ApiError {
    fn from(err: BookApplicationError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self.0 {
            // 400 Bad Request - 入力またはリクエスト対象の誤り
            BookApplicationError::DuplicateTitle => (
                StatusCode::BAD_REQUEST,
                "DUPLICATE_TITLE",
                "Title already exists".to_string(),
            ),
            BookApplicationError::BookNotFound => (
                StatusCode::BAD_REQUEST,
                "BOOK_NOT_FOUND",
                "Book not found".to_string(),
            ),
            BookApplicationError::InvalidBook(ref reason) => {
                (StatusCode::BAD_REQUEST, "INVALID_BOOK", reason.to_string())
            }

            // 409 Conflict - 在庫の状態と矛盾する
            BookApplicationError::OutOfStock => (
                StatusCode::CONFLICT,
                "OUT_OF_STOCK",
                "Out of stock".to_string(),
            ),

            // 503 Service Unavailable - 一時的な失敗（再試行可能）
            BookApplicationError::LockTimeout => (
                StatusCode::SERVICE_UNAVAILABLE,
                "LOCK_TIMEOUT",
                "Book is busy, please retry".to_string(),
            ),

            // 500 Internal Server Error - システム障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            BookApplicationError::Interrupted => {
                tracing::error!("Borrow task was interrupted before completion");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERRUPTED",
                    "Request was interrupted".to_string(),
                )
            }
            BookApplicationError::LedgerFailure(ref e) => {
                tracing::error!("Stock ledger error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LEDGER_ERROR",
                    "Failed to access the stock ledger".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
