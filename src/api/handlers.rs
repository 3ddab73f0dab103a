//! API Handlers
//!
//! Read-only diagnostics over a running toolkit instance.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::breaker::CircuitStatus;
use crate::cache::Cache;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{BreakersResponse, HealthResponse, StatsResponse};
use crate::registry::ResilienceRegistry;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Breakers, limiters and shared settings
    pub registry: ResilienceRegistry,
    /// Process-wide response cache
    pub cache: Cache<serde_json::Value>,
}

impl AppState {
    pub fn new(registry: ResilienceRegistry, cache: Cache<serde_json::Value>) -> Self {
        Self { registry, cache }
    }

    /// Builds a registry and starts a cache from configuration.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: &Config) -> Self {
        let registry = ResilienceRegistry::new(config.clone());
        let cache = registry.cache();
        Self::new(registry, cache)
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats().await))
}

/// Handler for GET /breakers
pub async fn breakers_handler(State(state): State<AppState>) -> Json<BreakersResponse> {
    Json(BreakersResponse::new(state.registry.breakers().all()))
}

/// Handler for GET /breakers/:name
pub async fn breaker_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CircuitStatus>, ApiError> {
    state
        .registry
        .breakers()
        .status(&name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("circuit breaker '{}'", name)))
}
