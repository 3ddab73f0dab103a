//! Cached operation wrapper
//!
//! Serves repeated invocations from a [`Cache`]. Only successful results are
//! stored; failures always reach the caller and are retried on the next call.

use std::sync::Arc;

use tracing::trace;

use crate::cache::Cache;
use crate::operation::{OpFuture, Operation};

pub struct Cached<O, V, K> {
    inner: Arc<O>,
    cache: Cache<V>,
    key_fn: K,
    ttl_seconds: u64,
}

impl<O, V, K> Cached<O, V, K> {
    pub fn new(inner: O, cache: Cache<V>, key_fn: K, ttl_seconds: u64) -> Self {
        Self {
            inner: Arc::new(inner),
            cache,
            key_fn,
            ttl_seconds,
        }
    }
}

impl<A, O, V, K> Operation<A> for Cached<O, V, K>
where
    A: Send + 'static,
    O: Operation<A, Output = V>,
    V: Clone + Send + Sync + 'static,
    K: Fn(&A) -> String + Send + Sync + 'static,
{
    type Output = V;
    type Error = O::Error;

    fn invoke(&self, args: A) -> OpFuture<V, O::Error> {
        let key = (self.key_fn)(&args);
        let inner = Arc::clone(&self.inner);
        let cache = self.cache.clone();
        let ttl_seconds = self.ttl_seconds;

        Box::pin(async move {
            if let Some(hit) = cache.get(&key).await {
                trace!(key = %key, "Serving cached result");
                return Ok(hit);
            }

            let value = inner.invoke(args).await?;
            cache.set(&key, value.clone(), ttl_seconds).await;
            Ok(value)
        })
    }
}
