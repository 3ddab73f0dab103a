//! Retry executor with exponential backoff
//!
//! Re-invokes a failing operation up to `max_attempts` times. The first gap
//! is `delay`, each later gap is the previous one times `backoff_multiplier`.
//! A caller-supplied predicate decides which errors are worth retrying; the
//! executor never guesses.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::operation::{OpFuture, Operation};

// == Retry Config ==
/// Numeric retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Gap before the second attempt
    pub delay: Duration,
    /// Factor applied to the gap after every failed attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }
}

type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

// == Retry Policy ==
/// Retry settings plus an optional retry predicate.
pub struct RetryPolicy<E> {
    config: RetryConfig,
    should_retry: Option<RetryPredicate<E>>,
}

impl<E> RetryPolicy<E> {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            should_retry: None,
        }
    }

    /// Shorthand for `max_attempts` and `delay` with the default multiplier.
    pub fn attempts(max_attempts: u32, delay: Duration) -> Self {
        Self::new(RetryConfig {
            max_attempts,
            delay,
            ..RetryConfig::default()
        })
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    /// Only errors for which `predicate` returns true are retried.
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Effective attempt budget; zero is treated as a single attempt.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        self.should_retry
            .as_ref()
            .map_or(true, |predicate| predicate(error))
    }

    /// Gap to wait after `previous`.
    fn next_delay(&self, previous: Duration) -> Duration {
        let secs = previous.as_secs_f64() * self.config.backoff_multiplier;
        if secs.is_finite() && secs >= 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            previous
        }
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            should_retry: self.should_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("has_predicate", &self.should_retry.is_some())
            .finish()
    }
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

// == Executor ==
/// Runs `operation` under `policy`, returning the first success or the last error.
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    policy: &RetryPolicy<E>,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts();
    let mut delay = policy.config.delay;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(error) => {
                if !policy.is_retryable(&error) {
                    debug!(
                        operation = operation_name,
                        attempt, "Non-retryable error, giving up"
                    );
                    return Err(error);
                }

                if attempt >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        "Retry attempts exhausted"
                    );
                    return Err(error);
                }

                debug!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, retrying"
                );
                sleep(delay).await;
                delay = policy.next_delay(delay);
                attempt += 1;
            }
        }
    }
}

// == Retrying Wrapper ==
/// Operation wrapper that retries the inner operation with cloned arguments.
pub struct Retrying<O, E> {
    inner: Arc<O>,
    policy: RetryPolicy<E>,
    name: Arc<str>,
}

impl<O, E> Retrying<O, E> {
    pub fn new(inner: O, policy: RetryPolicy<E>, name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(inner),
            policy,
            name: Arc::from(name.into()),
        }
    }
}

impl<A, O, E> Operation<A> for Retrying<O, E>
where
    A: Clone + Send + 'static,
    O: Operation<A, Error = E>,
    E: Send + 'static,
{
    type Output = O::Output;
    type Error = E;

    fn invoke(&self, args: A) -> OpFuture<Self::Output, E> {
        let inner = Arc::clone(&self.inner);
        let policy = self.policy.clone();
        let name = Arc::clone(&self.name);

        Box::pin(async move {
            let attempt = move || inner.invoke(args.clone());
            with_retry(attempt, &policy, &name).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResilienceError;
    use crate::operation::{operation, OperationExt};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Fails `failures` times with "failure N", then returns the attempt number.
    fn flaky(
        failures: u32,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut() -> std::future::Ready<Result<u32, String>>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let op = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                std::future::ready(Err(format!("failure {}", n)))
            } else {
                std::future::ready(Ok(n))
            }
        };
        (calls, op)
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_failures() {
        let (calls, op) = flaky(2);
        let policy = RetryPolicy::attempts(3, Duration::from_millis(10));

        let result = with_retry(op, &policy, "flaky").await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_raises_last_failure_when_exhausted() {
        let (calls, op) = flaky(2);
        let policy = RetryPolicy::attempts(2, Duration::from_millis(10));

        let result = with_retry(op, &policy, "flaky").await;
        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_short_circuits() {
        let (calls, op) = flaky(5);
        let policy = RetryPolicy::attempts(5, Duration::from_millis(10))
            .with_predicate(|e: &String| !e.starts_with("failure"));

        let result = with_retry(op, &policy, "validation").await;
        assert_eq!(result, Err("failure 1".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_gaps() {
        let (_, op) = flaky(3);
        let policy = RetryPolicy::attempts(4, Duration::from_millis(100));

        let start = Instant::now();
        let result = with_retry(op, &policy, "backoff").await;
        assert_eq!(result, Ok(4));
        // 100 + 200 + 400
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(700));
        assert!(elapsed < Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_multiplier() {
        let (_, op) = flaky(2);
        let policy =
            RetryPolicy::attempts(3, Duration::from_millis(50)).with_backoff_multiplier(1.0);

        let start = Instant::now();
        with_retry(op, &policy, "flat").await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let (calls, op) = flaky(1);
        let policy = RetryPolicy::attempts(0, Duration::from_millis(1));

        assert!(with_retry(op, &policy, "zero").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_wrapper_reuses_arguments() {
        let seen = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&seen);
        let op = operation(move |x: u32| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ResilienceError::failed("transient"))
                } else {
                    Ok(x + 1)
                }
            }
        })
        .with_retry(RetryPolicy::attempts(3, Duration::from_millis(5)), "inc");

        assert_eq!(op.invoke(41).await.unwrap(), 42);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
