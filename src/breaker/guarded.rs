//! Operation wrappers backed by a circuit breaker.

use std::sync::Arc;

use super::CircuitBreaker;
use crate::error::Rejection;
use crate::operation::{OpFuture, Operation};

// == Guarded ==
/// Fails fast with [`Rejection::CircuitOpen`] while the breaker is open.
pub struct Guarded<O> {
    inner: Arc<O>,
    breaker: CircuitBreaker,
}

impl<O> Guarded<O> {
    pub fn new(inner: O, breaker: CircuitBreaker) -> Self {
        Self {
            inner: Arc::new(inner),
            breaker,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<A, O> Operation<A> for Guarded<O>
where
    A: Send + 'static,
    O: Operation<A>,
    O::Error: From<Rejection>,
{
    type Output = O::Output;
    type Error = O::Error;

    fn invoke(&self, args: A) -> OpFuture<Self::Output, Self::Error> {
        let inner = Arc::clone(&self.inner);
        let breaker = self.breaker.clone();

        Box::pin(async move { breaker.call(move || inner.invoke(args)).await })
    }
}

// == With Fallback ==
/// Runs `fallback` with the same arguments when the breaker is open or the
/// primary call fails.
pub struct WithFallback<O, F> {
    inner: Arc<O>,
    fallback: Arc<F>,
    breaker: CircuitBreaker,
}

impl<O, F> WithFallback<O, F> {
    pub fn new(inner: O, breaker: CircuitBreaker, fallback: F) -> Self {
        Self {
            inner: Arc::new(inner),
            fallback: Arc::new(fallback),
            breaker,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<A, O, F> Operation<A> for WithFallback<O, F>
where
    A: Clone + Send + 'static,
    O: Operation<A>,
    F: Operation<A, Output = O::Output, Error = O::Error>,
{
    type Output = O::Output;
    type Error = O::Error;

    fn invoke(&self, args: A) -> OpFuture<Self::Output, Self::Error> {
        let inner = Arc::clone(&self.inner);
        let fallback = Arc::clone(&self.fallback);
        let breaker = self.breaker.clone();
        let fallback_args = args.clone();

        Box::pin(async move {
            breaker
                .call_with_fallback(
                    move || inner.invoke(args),
                    move || fallback.invoke(fallback_args),
                )
                .await
        })
    }
}
