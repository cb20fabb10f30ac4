use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::quote::{calculate_price, should_fail_randomly};

/// 価格サービスの状態
#[derive(Debug, Clone)]
pub struct PricingState {
    pub random_failure_percent: u8,
}

#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub fail: Option<bool>,
}

/// 価格サービスのエラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct PricingErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum PricingFailure {
    Forced,
    Random,
}

impl IntoResponse for PricingFailure {
    fn into_response(self) -> Response {
        let message = match self {
            PricingFailure::Forced => "Pricing service is down (forced failure)",
            PricingFailure::Random => "Random failure occurred in pricing service",
        };

        let body = Json(PricingErrorResponse {
            error: message.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// GET /api/prices/:book_id - 書籍の価格を返す
///
/// 不安定なサービスを模擬する：
/// 1. `fail=true`なら必ず失敗
/// 2. 設定された確率でランダムに失敗
/// 3. それ以外は価格をJSON数値で返す
pub async fn get_price(
    State(state): State<Arc<PricingState>>,
    Path(book_id): Path<i64>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<f64>, PricingFailure> {
    let fail = query.fail.unwrap_or(false);
    tracing::info!(
        "REST request to fetch price for book ID: {} (forced fail: {})",
        book_id,
        fail
    );

    if fail {
        tracing::error!("Forced failure triggered for book ID: {}", book_id);
        return Err(PricingFailure::Forced);
    }

    if should_fail_randomly(state.random_failure_percent) {
        tracing::warn!("Random failure occurred for book ID: {}", book_id);
        return Err(PricingFailure::Random);
    }

    let price = calculate_price(book_id);
    tracing::info!("Returning price for book ID: {}: {}", book_id, price);
    Ok(Json(price))
}
