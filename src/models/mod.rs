//! Response models for the diagnostics API
//!
//! DTOs serialized into HTTP response bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{BreakersResponse, HealthResponse, StatsResponse};
