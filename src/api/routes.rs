//! API Routes
//!
//! Configures the Axum router with the diagnostics endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    breaker_handler, breakers_handler, health_handler, stats_handler, AppState,
};

/// Creates the diagnostics router.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /stats` - Cache statistics
/// - `GET /breakers` - Status of every circuit breaker
/// - `GET /breakers/:name` - Status of one circuit breaker
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/breakers", get(breakers_handler))
        .route("/breakers/:name", get(breaker_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
