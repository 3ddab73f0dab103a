//! Circuit breaker state machine
//!
//! Pure transition logic over a small counter. Time is passed in, and every
//! transition reports the event to emit, so the caller decides where logging
//! happens and no lock is held while emitting.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::events::ResilienceEvent;

// == Circuit State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing fast until the reset timeout elapses
    Open,
    /// One probe call decides between CLOSED and OPEN
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(label)
    }
}

// == Circuit Breaker Config ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker (values below 1 are treated as 1)
    pub failure_threshold: u32,
    /// Cooldown measured from the last failure
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_millis(30_000),
        }
    }
}

// == Circuit Status ==
/// Read-only diagnostic snapshot of one breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Outcome of asking the breaker for permission to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Call may proceed; `probe` marks the single HALF_OPEN trial
    Allowed { probe: bool },
    /// Fail fast
    Rejected { failure_count: u32 },
}

// == Breaker State ==
#[derive(Debug, Clone)]
pub(crate) struct BreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u64,
    pub last_failure_at: Option<Instant>,
    pub last_failure_wall: Option<DateTime<Utc>>,
    pub probe_in_flight: bool,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_at: None,
            last_failure_wall: None,
            probe_in_flight: false,
        }
    }
}

impl BreakerState {
    /// Decides whether a call may run. OPEN -> HALF_OPEN happens here, on
    /// the first call after the cooldown, never on a timer.
    pub fn admit(
        &mut self,
        name: &str,
        config: &CircuitBreakerConfig,
        now: Instant,
    ) -> (Admission, Option<ResilienceEvent>) {
        match self.state {
            CircuitState::Closed => (Admission::Allowed { probe: false }, None),
            CircuitState::Open => {
                let cooled_down = self
                    .last_failure_at
                    .map_or(true, |at| now.duration_since(at) >= config.reset_timeout);
                if cooled_down {
                    self.state = CircuitState::HalfOpen;
                    self.probe_in_flight = true;
                    let event = ResilienceEvent::BreakerHalfOpen {
                        name: name.to_string(),
                    };
                    (Admission::Allowed { probe: true }, Some(event))
                } else {
                    (self.rejected(), None)
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    (self.rejected(), None)
                } else {
                    self.probe_in_flight = true;
                    (Admission::Allowed { probe: true }, None)
                }
            }
        }
    }

    fn rejected(&self) -> Admission {
        Admission::Rejected {
            failure_count: self.failure_count,
        }
    }

    /// Records a settled success. `probe` marks the HALF_OPEN trial call;
    /// only the probe may close a half-open breaker.
    pub fn record_success(&mut self, name: &str, probe: bool) -> Option<ResilienceEvent> {
        self.success_count += 1;
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
                None
            }
            // A call admitted before the breaker tripped settled during the
            // probe; it is counted but decides nothing.
            CircuitState::HalfOpen if !probe => None,
            CircuitState::HalfOpen => {
                self.state = CircuitState::Closed;
                self.failure_count = 0;
                self.probe_in_flight = false;
                Some(ResilienceEvent::BreakerClosed {
                    name: name.to_string(),
                })
            }
            // A call admitted while CLOSED finished after another call tripped
            // the breaker; the cooldown stands.
            CircuitState::Open => None,
        }
    }

    pub fn record_failure(
        &mut self,
        name: &str,
        config: &CircuitBreakerConfig,
        now: Instant,
        probe: bool,
    ) -> Option<ResilienceEvent> {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_at = Some(now);
        self.last_failure_wall = Some(Utc::now());

        let trips = match self.state {
            CircuitState::Closed => self.failure_count >= config.failure_threshold.max(1),
            CircuitState::HalfOpen => probe,
            CircuitState::Open => false,
        };
        if !trips {
            return None;
        }

        self.state = CircuitState::Open;
        self.probe_in_flight = false;
        Some(ResilienceEvent::BreakerOpened {
            name: name.to_string(),
            failure_count: self.failure_count,
        })
    }

    /// Forces the breaker back to CLOSED with cleared counters.
    pub fn reset(&mut self, name: &str) -> Option<ResilienceEvent> {
        let was = self.state;
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.probe_in_flight = false;
        (was != CircuitState::Closed).then(|| ResilienceEvent::BreakerClosed {
            name: name.to_string(),
        })
    }

    pub fn status(&self, name: &str) -> CircuitStatus {
        CircuitStatus {
            name: name.to_string(),
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            last_failure_at: self.last_failure_wall,
        }
    }
}
