//! Token-Bucket Rate Limiter
//!
//! Each bucket starts full with `rate` tokens. Once more than `interval` has
//! passed since the last refill, the bucket is reset to `rate` tokens and the
//! wait queue is drained in FIFO order, one token per waiter. The refill is
//! checked on every acquisition and by a background task every `interval / 2`.
//!
//! Callers that find the bucket empty are queued without limit and run their
//! own operation once granted a token, so they observe the real result.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::Rejection;
use crate::operation::{OpFuture, Operation};
use crate::tasks::spawn_refill_task;

// == Rate Limit Config ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens granted per interval (values below 1 are treated as 1)
    pub rate: u32,
    /// Refill period
    pub interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate: 10,
            interval: Duration::from_millis(1000),
        }
    }
}

struct BucketState {
    tokens: u32,
    last_refill: Instant,
    waiters: VecDeque<oneshot::Sender<()>>,
    closed: bool,
}

// == Token Bucket ==
/// Token bucket owning its refill task. Dropping the bucket stops the task.
pub struct TokenBucket {
    name: String,
    config: RateLimitConfig,
    state: Mutex<BucketState>,
    refill_task: JoinHandle<()>,
}

impl TokenBucket {
    /// Creates a full bucket and starts its refill task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(name: impl Into<String>, config: RateLimitConfig) -> Arc<Self> {
        let name = name.into();
        info!(
            limiter = %name,
            rate = config.rate,
            interval_ms = config.interval.as_millis() as u64,
            "Token bucket started"
        );

        Arc::new_cyclic(|weak| Self {
            refill_task: spawn_refill_task(weak.clone(), config.interval / 2),
            state: Mutex::new(BucketState {
                tokens: config.rate.max(1),
                last_refill: Instant::now(),
                waiters: VecDeque::new(),
                closed: false,
            }),
            name,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    fn rate(&self) -> u32 {
        self.config.rate.max(1)
    }

    /// Tokens currently available.
    pub fn tokens(&self) -> u32 {
        self.state.lock().tokens
    }

    /// Callers waiting for a token.
    pub fn queued(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Refills the bucket if the interval has passed. Returns how many
    /// queued callers were granted a token.
    pub fn refill_if_due(&self) -> usize {
        let mut state = self.state.lock();
        self.refill_locked(&mut state)
    }

    fn refill_locked(&self, state: &mut BucketState) -> usize {
        if state.closed {
            return 0;
        }

        let now = Instant::now();
        if now.duration_since(state.last_refill) <= self.config.interval {
            return 0;
        }

        state.tokens = self.rate();
        state.last_refill = now;

        let mut drained = 0;
        while state.tokens > 0 {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            // A waiter that went away does not consume a token.
            if waiter.send(()).is_ok() {
                state.tokens -= 1;
                drained += 1;
            }
        }

        if drained > 0 {
            debug!(
                limiter = %self.name,
                drained,
                remaining = state.waiters.len(),
                "Refilled bucket and drained waiters"
            );
        }
        drained
    }

    /// Takes a token, waiting in FIFO order if the bucket is empty.
    pub async fn acquire(&self) -> Result<(), Rejection> {
        let rx = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(self.closed());
            }
            self.refill_locked(&mut state);

            if state.tokens > 0 {
                state.tokens -= 1;
                return Ok(());
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(
                limiter = %self.name,
                queued = state.waiters.len(),
                "Bucket empty, queueing call"
            );
            rx
        };

        rx.await.map_err(|_| self.closed())
    }

    /// Runs `f` once a token is available.
    pub async fn run<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Rejection>,
    {
        self.acquire().await?;
        f().await
    }

    /// Stops the refill task and releases every queued caller with
    /// [`Rejection::Closed`].
    pub fn shutdown(&self) {
        self.refill_task.abort();
        let mut state = self.state.lock();
        state.closed = true;
        let abandoned = state.waiters.len();
        state.waiters.clear();
        info!(limiter = %self.name, abandoned, "Token bucket shut down");
    }

    fn closed(&self) -> Rejection {
        Rejection::Closed {
            name: self.name.clone(),
        }
    }
}

impl Drop for TokenBucket {
    fn drop(&mut self) {
        self.refill_task.abort();
    }
}

// == Rate Limited Wrapper ==
/// Operation wrapper that takes one token per invocation.
pub struct RateLimited<O> {
    inner: Arc<O>,
    bucket: Arc<TokenBucket>,
}

impl<O> RateLimited<O> {
    pub fn new(inner: O, bucket: Arc<TokenBucket>) -> Self {
        Self {
            inner: Arc::new(inner),
            bucket,
        }
    }

    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }
}

impl<A, O> Operation<A> for RateLimited<O>
where
    A: Send + 'static,
    O: Operation<A>,
    O::Error: From<Rejection>,
{
    type Output = O::Output;
    type Error = O::Error;

    fn invoke(&self, args: A) -> OpFuture<Self::Output, Self::Error> {
        let inner = Arc::clone(&self.inner);
        let bucket = Arc::clone(&self.bucket);

        Box::pin(async move { bucket.run(move || inner.invoke(args)).await })
    }
}
