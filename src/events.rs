//! Observability Events
//!
//! Every state transition in the toolkit is reported through an [`EventSink`]
//! as exactly one [`ResilienceEvent`], so circuit history can be rebuilt from
//! the event stream without reading internal state.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

// == Resilience Event ==
/// A single observable state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResilienceEvent {
    /// Breaker tripped (CLOSED -> OPEN or HALF_OPEN -> OPEN)
    BreakerOpened { name: String, failure_count: u32 },
    /// Cooldown elapsed and a probe call is being let through
    BreakerHalfOpen { name: String },
    /// Probe succeeded, or an operator reset the breaker
    BreakerClosed { name: String },
    /// Backpressure limiter rejected a call
    QueueOverflow {
        name: String,
        active: usize,
        queued: usize,
        max_queue: usize,
    },
    /// An entry was evicted to make room for a new key
    CacheEviction { key: String },
    /// The background sweep removed expired entries
    CacheSweep { removed: usize },
}

// == Event Sink ==
/// Destination for resilience events.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn emit(&self, event: &ResilienceEvent);
}

/// Default sink: one structured `tracing` event per transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ResilienceEvent) {
        match event {
            ResilienceEvent::BreakerOpened {
                name,
                failure_count,
            } => warn!(breaker = %name, failure_count, "Circuit breaker opened"),
            ResilienceEvent::BreakerHalfOpen { name } => {
                info!(breaker = %name, "Circuit breaker half-open, probing")
            }
            ResilienceEvent::BreakerClosed { name } => {
                info!(breaker = %name, "Circuit breaker closed")
            }
            ResilienceEvent::QueueOverflow {
                name,
                active,
                queued,
                max_queue,
            } => warn!(
                limiter = %name,
                active,
                queued,
                max_queue,
                "Backpressure queue overflow, rejecting call"
            ),
            ResilienceEvent::CacheEviction { key } => {
                debug!(key = %key, "Cache evicted least recently used entry")
            }
            ResilienceEvent::CacheSweep { removed } => {
                info!(removed, "Cache sweep removed expired entries")
            }
        }
    }
}

/// Returns the default tracing sink as a shareable trait object.
pub fn tracing_sink() -> Arc<dyn EventSink> {
    Arc::new(TracingSink)
}

// == Memory Sink ==
/// Sink that keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ResilienceEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<ResilienceEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &ResilienceEvent) {
        TracingSink.emit(event);
        self.events.lock().push(event.clone());
    }
}
