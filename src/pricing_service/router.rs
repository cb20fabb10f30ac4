use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{PricingState, get_price};

/// Creates the pricing simulator router
///
/// - GET /api/prices/:book_id - Price for a book (`?fail=true` forces a 500)
/// - GET /health - Health check
pub fn create_router(state: Arc<PricingState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/prices/:book_id", get(get_price))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
