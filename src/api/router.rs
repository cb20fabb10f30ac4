use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, borrow_book, circuit_breaker_status, create_book, get_book_by_id, instance_info,
    list_books,
};

/// Creates the API router with all book lending endpoints
///
/// Command endpoints (Write operations):
/// - POST /api/books - Register a new book
/// - POST /api/books/:id/borrow - Borrow one copy (`?fail=true` forces a pricing failure)
///
/// Query endpoints (Read operations):
/// - GET /api/books - List books
/// - GET /api/books/:id - Get book details
///
/// Debug endpoints:
/// - GET /api/debug/instance - Which instance answered
/// - GET /api/debug/circuit-breaker - Pricing circuit breaker state
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Catalog endpoints
        .route("/api/books", get(list_books).post(create_book))
        .route("/api/books/:id", get(get_book_by_id))
        .route("/api/books/:id/borrow", post(borrow_book))
        // Debug endpoints
        .route("/api/debug/instance", get(instance_info))
        .route("/api/debug/circuit-breaker", get(circuit_breaker_status))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
