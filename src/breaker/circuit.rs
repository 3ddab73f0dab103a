//! Circuit breaker handle
//!
//! A [`CircuitBreaker`] is a cheap, cloneable handle onto one named breaker
//! owned by a [`CircuitBreakerRegistry`](super::CircuitBreakerRegistry).
//! Handles obtained for the same name share state.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::state::{Admission, BreakerState, CircuitBreakerConfig, CircuitStatus};
use crate::error::Rejection;
use crate::events::{EventSink, ResilienceEvent};

pub(crate) struct BreakerCell {
    pub name: String,
    pub config: CircuitBreakerConfig,
    pub state: Mutex<BreakerState>,
}

impl BreakerCell {
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }
}

/// Clears the in-flight probe flag if the probe call is dropped before it
/// settles, so the breaker cannot get stuck in HALF_OPEN.
struct ProbeGuard {
    cell: Arc<BreakerCell>,
    armed: bool,
}

impl ProbeGuard {
    /// The probe settled and its outcome was recorded.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        if self.armed {
            self.cell.state.lock().probe_in_flight = false;
        }
    }
}

// == Circuit Breaker ==
#[derive(Clone)]
pub struct CircuitBreaker {
    cell: Arc<BreakerCell>,
    events: Arc<dyn EventSink>,
}

impl CircuitBreaker {
    pub(crate) fn from_cell(cell: Arc<BreakerCell>, events: Arc<dyn EventSink>) -> Self {
        Self { cell, events }
    }

    pub fn name(&self) -> &str {
        &self.cell.name
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.cell.config
    }

    pub fn status(&self) -> CircuitStatus {
        self.cell.state.lock().status(&self.cell.name)
    }

    fn emit(&self, event: Option<ResilienceEvent>) {
        if let Some(event) = event {
            self.events.emit(&event);
        }
    }

    fn admit(&self) -> Admission {
        let (admission, event) =
            self.cell
                .state
                .lock()
                .admit(&self.cell.name, &self.cell.config, Instant::now());
        self.emit(event);
        admission
    }

    fn record_success(&self, probe: bool) {
        let event = self.cell.state.lock().record_success(&self.cell.name, probe);
        self.emit(event);
    }

    fn record_failure(&self, probe: bool) {
        let event = self.cell.state.lock().record_failure(
            &self.cell.name,
            &self.cell.config,
            Instant::now(),
            probe,
        );
        self.emit(event);
    }

    /// Returns a guard for HALF_OPEN probes, `Err` when the call must fail fast.
    fn enter(&self) -> Result<Option<ProbeGuard>, u32> {
        match self.admit() {
            Admission::Allowed { probe } => Ok(probe.then(|| ProbeGuard {
                cell: Arc::clone(&self.cell),
                armed: true,
            })),
            Admission::Rejected { failure_count } => Err(failure_count),
        }
    }

    async fn attempt<F, Fut, T, E>(&self, probe: Option<ProbeGuard>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let result = f().await;
        let is_probe = probe.is_some();
        match &result {
            Ok(_) => self.record_success(is_probe),
            Err(_) => self.record_failure(is_probe),
        }
        if let Some(probe) = probe {
            probe.disarm();
        }
        result
    }

    // == Call ==
    /// Runs `f` unless the breaker is open, in which case the call fails
    /// fast with [`Rejection::CircuitOpen`] and `f` is never invoked.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Rejection>,
    {
        let probe = match self.enter() {
            Ok(probe) => probe,
            Err(failure_count) => {
                debug!(breaker = %self.cell.name, failure_count, "Circuit open, failing fast");
                return Err(Rejection::CircuitOpen {
                    name: self.cell.name.clone(),
                    failure_count,
                }
                .into());
            }
        };

        self.attempt(probe, f).await
    }

    // == Call With Fallback ==
    /// Like [`call`](Self::call), but returns `fallback`'s outcome instead
    /// of failing fast or surfacing the primary error. Fallback errors
    /// propagate as-is.
    pub async fn call_with_fallback<F, Fut, G, GFut, T, E>(&self, f: F, fallback: G) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
    {
        let probe = match self.enter() {
            Ok(probe) => probe,
            Err(failure_count) => {
                debug!(breaker = %self.cell.name, failure_count, "Circuit open, using fallback");
                return fallback().await;
            }
        };

        match self.attempt(probe, f).await {
            Ok(value) => Ok(value),
            Err(_) => {
                debug!(breaker = %self.cell.name, "Primary call failed, using fallback");
                fallback().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{CircuitBreakerRegistry, CircuitState};
    use crate::error::{ErrorKind, ResilienceError};
    use crate::events::MemorySink;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn breaker(threshold: u32, reset_ms: u64) -> (CircuitBreaker, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let registry = CircuitBreakerRegistry::new(
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout: Duration::from_millis(reset_ms),
            },
            sink.clone(),
        );
        (registry.breaker("dependency"), sink)
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), ResilienceError> {
        breaker
            .call(|| async { Err(ResilienceError::failed("down")) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u32, ResilienceError> {
        breaker.call(|| async { Ok(1) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle() {
        let (breaker, sink) = breaker(2, 100);
        let invoked = AtomicU32::new(0);

        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.status().state, CircuitState::Open);

        // Fails fast without touching the operation.
        let err = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ResilienceError>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(succeed(&breaker).await.unwrap(), 1);

        let status = breaker.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_count, 0);
        assert!(status.last_failure_at.is_some());

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ResilienceEvent::BreakerOpened { .. }));
        assert!(matches!(events[1], ResilienceEvent::BreakerHalfOpen { .. }));
        assert!(matches!(events[2], ResilienceEvent::BreakerClosed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens() {
        let (breaker, _) = breaker(1, 50);

        fail(&breaker).await.unwrap_err();
        sleep(Duration::from_millis(60)).await;

        let err = fail(&breaker).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Operation);
        assert_eq!(breaker.status().state, CircuitState::Open);
        assert_eq!(breaker.status().failure_count, 2);

        let err = succeed(&breaker).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_during_probe_fail_fast() {
        let (breaker, _) = breaker(1, 10);
        fail(&breaker).await.unwrap_err();
        sleep(Duration::from_millis(10)).await;

        let probe = tokio::spawn({
            let breaker = breaker.clone();
            async move {
                breaker
                    .call(|| async {
                        sleep(Duration::from_millis(50)).await;
                        Ok::<_, ResilienceError>("probe")
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert_eq!(breaker.status().state, CircuitState::HalfOpen);

        let err = succeed(&breaker).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);

        assert_eq!(probe.await.unwrap().unwrap(), "probe");
        assert_eq!(breaker.status().state, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_finishing_during_probe_does_not_close() {
        let (breaker, _) = breaker(1, 10);

        // Admitted while CLOSED, settles only after the probe has started.
        let straggler = tokio::spawn({
            let breaker = breaker.clone();
            async move {
                breaker
                    .call(|| async {
                        sleep(Duration::from_millis(20)).await;
                        Ok::<_, ResilienceError>("late")
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;

        fail(&breaker).await.unwrap_err();
        sleep(Duration::from_millis(10)).await;

        let trial = tokio::spawn({
            let breaker = breaker.clone();
            async move {
                breaker
                    .call(|| async {
                        sleep(Duration::from_millis(50)).await;
                        Ok::<_, ResilienceError>("trial")
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert_eq!(breaker.status().state, CircuitState::HalfOpen);

        assert_eq!(straggler.await.unwrap().unwrap(), "late");
        assert_eq!(breaker.status().state, CircuitState::HalfOpen);
        let err = succeed(&breaker).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);

        assert_eq!(trial.await.unwrap().unwrap(), "trial");
        assert_eq!(breaker.status().state, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_probe_releases_half_open() {
        let (breaker, _) = breaker(1, 10);
        fail(&breaker).await.unwrap_err();
        sleep(Duration::from_millis(10)).await;

        let probe = tokio::spawn({
            let breaker = breaker.clone();
            async move {
                breaker
                    .call(|| async {
                        sleep(Duration::from_secs(60)).await;
                        Ok::<_, ResilienceError>(())
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;
        probe.abort();
        let _ = probe.await;

        assert_eq!(succeed(&breaker).await.unwrap(), 1);
        assert_eq!(breaker.status().state, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_used_on_failure_and_when_open() {
        let (breaker, _) = breaker(1, 1000);
        let primary_calls = AtomicU32::new(0);

        let first: Result<&str, ResilienceError> = breaker
            .call_with_fallback(
                || async {
                    primary_calls.fetch_add(1, Ordering::SeqCst);
                    Err(ResilienceError::failed("down"))
                },
                || async { Ok("stale") },
            )
            .await;
        assert_eq!(first.unwrap(), "stale");
        assert_eq!(breaker.status().state, CircuitState::Open);

        let second: Result<&str, ResilienceError> = breaker
            .call_with_fallback(
                || async {
                    primary_calls.fetch_add(1, Ordering::SeqCst);
                    Ok("fresh")
                },
                || async { Ok("stale") },
            )
            .await;
        assert_eq!(second.unwrap(), "stale");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_error_propagates() {
        let (breaker, _) = breaker(1, 1000);

        let result: Result<(), ResilienceError> = breaker
            .call_with_fallback(
                || async { Err(ResilienceError::failed("primary")) },
                || async { Err(ResilienceError::failed("fallback")) },
            )
            .await;
        assert_eq!(result.unwrap_err().to_string(), "Operation failed: fallback");
    }
}
