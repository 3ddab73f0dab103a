//! Operation Abstraction
//!
//! An [`Operation`] is anything that can be invoked with an argument and
//! settles with `Result<Output, Error>`. Every wrapper in this crate takes an
//! operation and is itself an operation with the same output and error types,
//! so wrappers chain in any order:
//!
//! ```ignore
//! let guarded = operation(|id: u64| async move { load_task(id).await })
//!     .with_retry(registry.retry_policy(), "load_task")
//!     .with_circuit_breaker(registry.breaker("db"))
//!     .with_backpressure(registry.concurrency_limiter("db"));
//! let task = guarded.invoke(42).await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::{CircuitBreaker, Guarded, WithFallback};
use crate::cache::{Cache, Cached};
use crate::limiter::{Backpressured, ConcurrencyLimiter, RateLimited, TokenBucket};
use crate::retry::{RetryPolicy, Retrying};
use crate::timeout::Timed;

/// Boxed future returned by [`Operation::invoke`].
pub type OpFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

// == Operation ==
/// An asynchronous operation invoked with arguments of type `A`.
///
/// Use a tuple for several arguments and `()` for none.
pub trait Operation<A>: Send + Sync + 'static {
    type Output: Send + 'static;
    type Error: Send + 'static;

    /// Starts one invocation.
    fn invoke(&self, args: A) -> OpFuture<Self::Output, Self::Error>;
}

impl<A, O> Operation<A> for Arc<O>
where
    O: Operation<A> + ?Sized,
{
    type Output = O::Output;
    type Error = O::Error;

    fn invoke(&self, args: A) -> OpFuture<Self::Output, Self::Error> {
        (**self).invoke(args)
    }
}

// == Closure Adapter ==
/// Operation backed by a closure. Built with [`operation`].
#[derive(Clone, Copy)]
pub struct OpFn<F> {
    f: F,
}

/// Turns an async closure into an [`Operation`].
pub fn operation<F>(f: F) -> OpFn<F> {
    OpFn { f }
}

impl<A, F, Fut, T, E> Operation<A> for OpFn<F>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn invoke(&self, args: A) -> OpFuture<T, E> {
        Box::pin((self.f)(args))
    }
}

// == Builder Extension ==
/// Chaining helpers available on every operation.
pub trait OperationExt<A>: Operation<A> + Sized {
    /// Re-invokes on failure according to `policy`.
    fn with_retry(
        self,
        policy: RetryPolicy<Self::Error>,
        name: impl Into<String>,
    ) -> Retrying<Self, Self::Error> {
        Retrying::new(self, policy, name)
    }

    /// Fails fast while `breaker` is open.
    fn with_circuit_breaker(self, breaker: CircuitBreaker) -> Guarded<Self> {
        Guarded::new(self, breaker)
    }

    /// Fails over to `fallback` while `breaker` is open or when the call fails.
    fn with_circuit_breaker_fallback<F>(
        self,
        breaker: CircuitBreaker,
        fallback: F,
    ) -> WithFallback<Self, F> {
        WithFallback::new(self, breaker, fallback)
    }

    /// Caps concurrent invocations with a bounded wait queue.
    fn with_backpressure(self, limiter: ConcurrencyLimiter) -> Backpressured<Self> {
        Backpressured::new(self, limiter)
    }

    /// Caps the invocation rate with a token bucket.
    fn rate_limited(self, bucket: Arc<TokenBucket>) -> RateLimited<Self> {
        RateLimited::new(self, bucket)
    }

    /// Races each invocation against a timer.
    fn with_timeout(self, duration: Duration, name: impl Into<String>) -> Timed<Self> {
        Timed::new(self, duration, name)
    }

    /// Serves successful results from `cache`, keyed by `key_fn(&args)`.
    fn cached<K>(
        self,
        cache: Cache<Self::Output>,
        key_fn: K,
        ttl_seconds: u64,
    ) -> Cached<Self, Self::Output, K>
    where
        K: Fn(&A) -> String,
    {
        Cached::new(self, cache, key_fn, ttl_seconds)
    }
}

impl<A, O: Operation<A>> OperationExt<A> for O {}
