//! Background Tasks Module
//!
//! Periodic tasks owned by a component instance. Each task holds only a weak
//! reference to its component and exits once the component is gone; the
//! component also aborts the task explicitly on teardown.
//!
//! # Tasks
//! - Cache sweep: removes expired cache entries at a fixed interval
//! - Bucket refill: refills a token bucket every half interval

mod cleanup;
mod refill;

pub use cleanup::spawn_cleanup_task;
pub use refill::spawn_refill_task;

use std::time::Duration;

/// Shortest period a background task will tick at.
pub(crate) const MIN_TICK: Duration = Duration::from_millis(1);
