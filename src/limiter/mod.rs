//! Flow Control Module
//!
//! - `backpressure` - Concurrency cap with a bounded FIFO wait queue
//! - `rate` - Token bucket with periodic refill

mod backpressure;
mod rate;

pub use backpressure::{BackpressureConfig, Backpressured, ConcurrencyLimiter, Permit};
pub use rate::{RateLimitConfig, RateLimited, TokenBucket};
