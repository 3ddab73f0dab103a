//! Circuit Breaker Module
//!
//! Named circuit breakers with CLOSED / OPEN / HALF_OPEN states.
//!
//! # Components
//! - `state` - Pure transition logic and status snapshots
//! - `circuit` - Cloneable breaker handle with `call` / `call_with_fallback`
//! - `registry` - Name-keyed breaker registry
//! - `guarded` - Operation wrappers

mod circuit;
mod guarded;
mod registry;
mod state;

pub use circuit::CircuitBreaker;
pub use guarded::{Guarded, WithFallback};
pub use registry::CircuitBreakerRegistry;
pub use state::{CircuitBreakerConfig, CircuitState, CircuitStatus};
