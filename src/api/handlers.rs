use crate::application::book::{
    BookApplicationError, ServiceDependencies, borrow_book as execute_borrow_book,
    get_book as execute_get_book, list_books as execute_list_books,
    register_book as execute_register_book,
};
use crate::domain::{BookId, BorrowBook};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{
    error::ApiError,
    types::{
        BookResponse, BorrowQuery, BorrowResponse, CircuitBreakerResponse, CreateBookRequest,
        ErrorResponse,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
    pub instance: InstanceInfo,
}

/// このインスタンスの識別情報（負荷分散の確認用）
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub hostname: String,
    pub port: u16,
}

// ============================================================================
// Command handlers (POST)
// ============================================================================

/// POST /api/books - 書籍を登録
///
/// 強制されるビジネスルール:
/// - タイトル・著者が空でなく、長さ制限内であること
/// - 在庫が0以上であること
/// - タイトルが一意であること
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let cmd = req.to_command(chrono::Utc::now());

    let book = execute_register_book(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// POST /api/books/:id/borrow - 書籍を1冊貸し出す
///
/// `?fail=true`で価格サービスを強制的に失敗させる（価格は0.0になる）。
///
/// 貸出処理は別タスクで実行し、ハンドラーはその完了を待つ。
/// クライアントが切断してもトランザクションは途中で中断されない。
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<i64>,
    Query(query): Query<BorrowQuery>,
) -> Result<Json<BorrowResponse>, ApiError> {
    let cmd = BorrowBook {
        book_id: BookId::new(book_id),
        force_pricing_failure: query.fail.unwrap_or(false),
        borrowed_at: chrono::Utc::now(),
    };

    let deps = state.service_deps.clone();
    let result = tokio::spawn(async move { execute_borrow_book(&deps, cmd).await })
        .await
        .map_err(|e| {
            tracing::error!("Borrow task failed to complete: {}", e);
            ApiError::from(BookApplicationError::Interrupted)
        })??;

    Ok(Json(BorrowResponse::from(result)))
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /api/books - 全書籍を取得
pub async fn list_books(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookResponse>>, QueryError> {
    let books = execute_list_books(&state.service_deps)
        .await
        .map_err(|e| QueryError::InternalError(e.to_string()))?;

    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// GET /api/books/:id - 書籍をIDで取得
///
/// 見つからない場合は404を返す。
pub async fn get_book_by_id(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<i64>,
) -> Result<Json<BookResponse>, QueryError> {
    let book_id = BookId::new(book_id);

    match execute_get_book(&state.service_deps, book_id).await {
        Ok(book) => Ok(Json(BookResponse::from(book))),
        Err(BookApplicationError::BookNotFound) => {
            Err(QueryError::NotFound(format!("Book {} not found", book_id)))
        }
        Err(e) => Err(QueryError::InternalError(e.to_string())),
    }
}

/// GET /api/debug/instance - 応答したインスタンスを返す
pub async fn instance_info(State(state): State<Arc<AppState>>) -> String {
    format!(
        "instance={} internalPort={}",
        state.instance.hostname, state.instance.port
    )
}

/// GET /api/debug/circuit-breaker - 価格サービス用ブレーカーの状態
pub async fn circuit_breaker_status(
    State(state): State<Arc<AppState>>,
) -> Json<CircuitBreakerResponse> {
    Json(CircuitBreakerResponse::snapshot(&state.service_deps.price_lookup).await)
}

// ============================================================================
// Error types
// ============================================================================

/// クエリハンドラー用のエラー型
#[derive(Debug)]
pub enum QueryError {
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            QueryError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            QueryError::InternalError(msg) => {
                // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
                tracing::error!("Internal error in query handler: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
