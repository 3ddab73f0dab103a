//! Timeout wrapper
//!
//! None of the other components bound how long the wrapped operation runs.
//! This wrapper races the operation against a timer: whichever settles first
//! wins. On timeout the operation's future is dropped, which releases its
//! resources, but work it already handed off elsewhere may still complete.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::Rejection;
use crate::operation::{OpFuture, Operation};

/// Awaits `future` for at most `duration`.
pub async fn with_timeout<F, T, E>(future: F, duration: Duration, name: &str) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Rejection>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            let elapsed_ms = duration.as_millis() as u64;
            warn!(operation = name, elapsed_ms, "Operation timed out");
            Err(Rejection::Timeout {
                name: name.to_string(),
                elapsed_ms,
            }
            .into())
        }
    }
}

/// Operation wrapper applying [`with_timeout`] to every invocation.
pub struct Timed<O> {
    inner: Arc<O>,
    duration: Duration,
    name: Arc<str>,
}

impl<O> Timed<O> {
    pub fn new(inner: O, duration: Duration, name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(inner),
            duration,
            name: Arc::from(name.into()),
        }
    }
}

impl<A, O> Operation<A> for Timed<O>
where
    A: Send + 'static,
    O: Operation<A>,
    O::Error: From<Rejection>,
{
    type Output = O::Output;
    type Error = O::Error;

    fn invoke(&self, args: A) -> OpFuture<Self::Output, Self::Error> {
        let call = self.inner.invoke(args);
        let duration = self.duration;
        let name = Arc::clone(&self.name);

        Box::pin(async move { with_timeout(call, duration, &name).await })
    }
}
