//! API Module
//!
//! Read-only HTTP diagnostics for the resilience toolkit.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache statistics
//! - `GET /breakers` - All circuit breaker statuses
//! - `GET /breakers/:name` - One circuit breaker status

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
