//! Flowguard - resilience and flow-control toolkit
//!
//! Wraps async operations with circuit breaking, retry with backoff, token
//! bucket rate limiting, bounded backpressure, timeouts and a TTL/LRU cache.
//! Wrappers compose through [`OperationExt`]:
//!
//! ```ignore
//! let registry = ResilienceRegistry::new(Config::from_env());
//! let fetch = operation(|id: u64| async move { fetch_record(id).await })
//!     .with_circuit_breaker(registry.breaker("records"))
//!     .with_backpressure(registry.concurrency_limiter("records"));
//! ```

pub mod api;
pub mod breaker;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod models;
pub mod operation;
pub mod registry;
pub mod retry;
pub mod tasks;
pub mod timeout;

pub use api::AppState;
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use cache::{Cache, CacheConfig};
pub use config::Config;
pub use error::{ErrorKind, Rejection, ResilienceError};
pub use events::{EventSink, MemorySink, ResilienceEvent, TracingSink};
pub use limiter::{BackpressureConfig, ConcurrencyLimiter, RateLimitConfig, TokenBucket};
pub use operation::{operation, Operation, OperationExt};
pub use registry::ResilienceRegistry;
pub use retry::{with_retry, RetryConfig, RetryPolicy};
pub use timeout::with_timeout;
