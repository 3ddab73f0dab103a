//! Error types for the resilience toolkit
//!
//! Provides unified error handling using thiserror.
//!
//! Toolkit rejections travel through the caller's own error type via
//! `From<Rejection>`, so a wrapped operation keeps its `Result<T, E>` shape.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

// == Error Kind ==
/// Coarse classification used for programmatic branching upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The wrapped operation itself failed
    Operation,
    /// A queue or concurrency limit was exceeded
    CapacityExceeded,
    /// A circuit breaker refused the call
    CircuitOpen,
    /// The operation did not settle in time
    Timeout,
    /// The component was torn down while the call waited
    Closed,
}

// == Rejection ==
/// A call refused by the toolkit before (or instead of) completing the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Breaker is open and no fallback was supplied
    #[error("Circuit breaker '{name}' is open ({failure_count} consecutive failures)")]
    CircuitOpen { name: String, failure_count: u32 },

    /// Backpressure queue is full
    #[error("Queue overflow on '{name}': {active} active, {queued} queued (max queue {max_queue})")]
    QueueOverflow {
        name: String,
        active: usize,
        queued: usize,
        max_queue: usize,
    },

    /// Timeout wrapper fired first
    #[error("Operation '{name}' timed out after {elapsed_ms}ms")]
    Timeout { name: String, elapsed_ms: u64 },

    /// Limiter dropped while the caller was queued
    #[error("Limiter '{name}' shut down before the call was admitted")]
    Closed { name: String },
}

impl Rejection {
    /// Returns the error kind of this rejection.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Rejection::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Rejection::QueueOverflow { .. } => ErrorKind::CapacityExceeded,
            Rejection::Timeout { .. } => ErrorKind::Timeout,
            Rejection::Closed { .. } => ErrorKind::Closed,
        }
    }

    /// Name of the breaker, limiter or operation that rejected the call.
    pub fn source_name(&self) -> &str {
        match self {
            Rejection::CircuitOpen { name, .. }
            | Rejection::QueueOverflow { name, .. }
            | Rejection::Timeout { name, .. }
            | Rejection::Closed { name } => name,
        }
    }
}

// == Resilience Error ==
/// Ready-made error type for operations that have no error type of their own.
#[derive(Error, Debug)]
pub enum ResilienceError {
    /// Refused by a toolkit component
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// The operation failed
    #[error("Operation failed: {0}")]
    Failed(#[from] anyhow::Error),
}

impl ResilienceError {
    /// Builds a `Failed` error from a message.
    pub fn failed(msg: impl Into<String>) -> Self {
        ResilienceError::Failed(anyhow::anyhow!(msg.into()))
    }

    /// Returns the error kind, preserving the rejection kind when present.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResilienceError::Rejected(rejection) => rejection.kind(),
            ResilienceError::Failed(_) => ErrorKind::Operation,
        }
    }

    /// Returns the rejection if this error came from the toolkit.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ResilienceError::Rejected(rejection) => Some(rejection),
            ResilienceError::Failed(_) => None,
        }
    }
}

// == Cache Error ==
/// Internal cache store errors. The `Cache` facade logs and absorbs these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Internal store failure
    #[error("Internal error: {0}")]
    Internal(String),
}

// == API Error ==
/// Errors returned by the diagnostics endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Requested breaker does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache store operations.
pub type Result<T> = std::result::Result<T, CacheError>;
