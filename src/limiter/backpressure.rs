//! Backpressure Limiter
//!
//! Caps concurrent in-flight invocations. Callers over the cap wait in a
//! bounded FIFO queue; when the queue is full the call is rejected at once
//! with [`Rejection::QueueOverflow`].
//!
//! A slot is represented by a [`Permit`]. Dropping the permit hands the slot
//! straight to the oldest live waiter, or frees it when nobody is waiting.
//! Because release happens in `Drop`, a slot is returned on success, failure,
//! cancellation and panic alike.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::Rejection;
use crate::events::{EventSink, ResilienceEvent};
use crate::operation::{OpFuture, Operation};

// == Backpressure Config ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackpressureConfig {
    /// Maximum in-flight invocations (values below 1 are treated as 1)
    pub max_concurrency: usize,
    /// Maximum queued callers; 0 means unbounded
    pub max_queue: usize,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            max_queue: 100,
        }
    }
}

#[derive(Default)]
struct BackpressureState {
    active: usize,
    waiters: VecDeque<oneshot::Sender<Permit>>,
}

struct Shared {
    name: String,
    config: BackpressureConfig,
    state: Mutex<BackpressureState>,
    events: Arc<dyn EventSink>,
}

impl Shared {
    fn max_concurrency(&self) -> usize {
        self.config.max_concurrency.max(1)
    }

    /// Passes a released slot to the next live waiter, or frees it.
    fn release(shared: &Arc<Shared>) {
        let mut state = shared.state.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(Permit::new(Arc::clone(shared))) {
                Ok(()) => return,
                Err(mut undelivered) => {
                    // Waiter gave up; this permit must not release again.
                    undelivered.shared = None;
                }
            }
        }
        state.active = state.active.saturating_sub(1);
    }
}

// == Permit ==
/// Proof of an admitted slot. The slot is released when this is dropped.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct Permit {
    shared: Option<Arc<Shared>>,
}

impl Permit {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared: Some(shared),
        }
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let limiter = self.shared.as_ref().map(|shared| shared.name.as_str());
        f.debug_struct("Permit").field("limiter", &limiter).finish()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            Shared::release(&shared);
        }
    }
}

// == Concurrency Limiter ==
/// Concurrency limiter with a bounded FIFO wait queue.
///
/// Cloning shares the same slots and queue.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    shared: Arc<Shared>,
}

enum Admission {
    Admitted(Permit),
    Queued(oneshot::Receiver<Permit>),
    Rejected(Rejection),
}

impl ConcurrencyLimiter {
    pub fn new(
        name: impl Into<String>,
        config: BackpressureConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                config,
                state: Mutex::new(BackpressureState::default()),
                events,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> BackpressureConfig {
        self.shared.config
    }

    /// Number of admitted, unsettled invocations.
    pub fn active(&self) -> usize {
        self.shared.state.lock().active
    }

    /// Number of callers waiting for a slot.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().waiters.len()
    }

    fn admit(&self) -> Admission {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        if state.active < shared.max_concurrency() {
            state.active += 1;
            return Admission::Admitted(Permit::new(Arc::clone(shared)));
        }

        // Cancelled callers must not hold queue capacity.
        state.waiters.retain(|waiter| !waiter.is_closed());

        let max_queue = shared.config.max_queue;
        let queued = state.waiters.len();
        if max_queue != 0 && queued >= max_queue {
            return Admission::Rejected(Rejection::QueueOverflow {
                name: shared.name.clone(),
                active: state.active,
                queued,
                max_queue,
            });
        }

        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(tx);
        debug!(
            limiter = %shared.name,
            active = state.active,
            queued = queued + 1,
            "At capacity, queueing call"
        );
        Admission::Queued(rx)
    }

    /// Waits for a slot, or fails immediately when the queue is full.
    pub async fn acquire(&self) -> Result<Permit, Rejection> {
        match self.admit() {
            Admission::Admitted(permit) => Ok(permit),
            Admission::Queued(rx) => rx.await.map_err(|_| Rejection::Closed {
                name: self.shared.name.clone(),
            }),
            Admission::Rejected(rejection) => {
                if let Rejection::QueueOverflow {
                    name,
                    active,
                    queued,
                    max_queue,
                } = &rejection
                {
                    self.shared.events.emit(&ResilienceEvent::QueueOverflow {
                        name: name.clone(),
                        active: *active,
                        queued: *queued,
                        max_queue: *max_queue,
                    });
                }
                Err(rejection)
            }
        }
    }

    /// Runs `f` inside a slot.
    pub async fn run<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Rejection>,
    {
        let _permit = self.acquire().await?;
        f().await
    }
}

// == Backpressured Wrapper ==
/// Operation wrapper that runs every invocation through a [`ConcurrencyLimiter`].
pub struct Backpressured<O> {
    inner: Arc<O>,
    limiter: ConcurrencyLimiter,
}

impl<O> Backpressured<O> {
    pub fn new(inner: O, limiter: ConcurrencyLimiter) -> Self {
        Self {
            inner: Arc::new(inner),
            limiter,
        }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }
}

impl<A, O> Operation<A> for Backpressured<O>
where
    A: Send + 'static,
    O: Operation<A>,
    O::Error: From<Rejection>,
{
    type Output = O::Output;
    type Error = O::Error;

    fn invoke(&self, args: A) -> OpFuture<Self::Output, Self::Error> {
        let inner = Arc::clone(&self.inner);
        let limiter = self.limiter.clone();

        Box::pin(async move { limiter.run(move || inner.invoke(args)).await })
    }
}
