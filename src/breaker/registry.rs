//! Circuit Breaker Registry
//!
//! Breakers are keyed by name and created lazily on first use. Every handle
//! for a name shares one state, so independent call sites guarding the same
//! dependency trip together.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::circuit::{BreakerCell, CircuitBreaker};
use super::state::{CircuitBreakerConfig, CircuitStatus};
use crate::events::EventSink;

// == Circuit Breaker Registry ==
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    breakers: Arc<RwLock<HashMap<String, Arc<BreakerCell>>>>,
    default_config: CircuitBreakerConfig,
    events: Arc<dyn EventSink>,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            breakers: Arc::new(RwLock::new(HashMap::new())),
            default_config,
            events,
        }
    }

    pub fn default_config(&self) -> CircuitBreakerConfig {
        self.default_config
    }

    /// Returns the breaker for `name`, creating it with the default config.
    pub fn breaker(&self, name: &str) -> CircuitBreaker {
        self.breaker_with(name, self.default_config)
    }

    /// Returns the breaker for `name`, creating it with `config` if absent.
    ///
    /// The first creation wins; later configs for an existing name are ignored.
    pub fn breaker_with(&self, name: &str, config: CircuitBreakerConfig) -> CircuitBreaker {
        if let Some(cell) = self.breakers.read().get(name) {
            return CircuitBreaker::from_cell(Arc::clone(cell), Arc::clone(&self.events));
        }

        let mut breakers = self.breakers.write();
        let cell = breakers.entry(name.to_string()).or_insert_with(|| {
            debug!(
                breaker = %name,
                failure_threshold = config.failure_threshold,
                reset_timeout_ms = config.reset_timeout.as_millis() as u64,
                "Circuit breaker created"
            );
            Arc::new(BreakerCell::new(name.to_string(), config))
        });
        CircuitBreaker::from_cell(Arc::clone(cell), Arc::clone(&self.events))
    }

    /// Status of one breaker, `None` if it was never used.
    pub fn status(&self, name: &str) -> Option<CircuitStatus> {
        self.breakers
            .read()
            .get(name)
            .map(|cell| cell.state.lock().status(&cell.name))
    }

    /// Status of every breaker, sorted by name.
    pub fn all(&self) -> Vec<CircuitStatus> {
        let mut statuses: Vec<CircuitStatus> = self
            .breakers
            .read()
            .values()
            .map(|cell| cell.state.lock().status(&cell.name))
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Forces a breaker back to CLOSED. Returns false for unknown names.
    pub fn reset(&self, name: &str) -> bool {
        let Some(cell) = self.breakers.read().get(name).cloned() else {
            return false;
        };

        let event = cell.state.lock().reset(&cell.name);
        info!(breaker = %name, "Circuit breaker reset");
        if let Some(event) = event {
            self.events.emit(&event);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}
