//! Cache Facade
//!
//! Shared, async handle over a [`CacheStore`] that never surfaces errors.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, CacheStore};
use crate::events::{EventSink, ResilienceEvent};
use crate::tasks::spawn_cleanup_task;

// == Cache Config ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum live entries before LRU eviction kicks in
    pub max_keys: usize,
    /// TTL in seconds used by `set_default`
    pub default_ttl: u64,
    /// Period of the background expiry sweep
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_keys: 1000,
            default_ttl: 300,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Aborts the sweep task when the last cache handle goes away.
#[derive(Debug)]
struct SweepGuard(JoinHandle<()>);

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// == Cache ==
/// Cloneable cache handle. Clones share the same store and sweep task.
pub struct Cache<V> {
    store: Arc<RwLock<CacheStore<V>>>,
    events: Arc<dyn EventSink>,
    sweep: Option<Arc<SweepGuard>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            sweep: self.sweep.clone(),
        }
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache and starts its expiry sweep.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: CacheConfig, events: Arc<dyn EventSink>) -> Self {
        let mut cache = Self::without_sweep(config, events);
        let handle = spawn_cleanup_task(
            Arc::downgrade(&cache.store),
            config.sweep_interval,
            Arc::clone(&cache.events),
        );
        cache.sweep = Some(Arc::new(SweepGuard(handle)));
        info!(
            max_keys = config.max_keys,
            default_ttl = config.default_ttl,
            sweep_interval_ms = config.sweep_interval.as_millis() as u64,
            "Cache started"
        );
        cache
    }

    /// Creates a cache that only expires entries lazily on read.
    pub fn without_sweep(config: CacheConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            store: Arc::new(RwLock::new(CacheStore::new(
                config.max_keys,
                config.default_ttl,
            ))),
            events,
            sweep: None,
        }
    }

    // == Set ==
    /// Stores `value` for `ttl_seconds`. Invalid keys are ignored.
    ///
    /// The cache owns its copy; `get` always hands out a fresh clone.
    pub async fn set(&self, key: &str, value: V, ttl_seconds: u64) {
        let result = self.store.write().await.set(key, value, ttl_seconds);
        match result {
            Ok(Some(evicted)) => {
                self.events
                    .emit(&ResilienceEvent::CacheEviction { key: evicted });
            }
            Ok(None) => debug!(key, ttl_seconds, "Cache set"),
            Err(error) => warn!(key, %error, "Cache set failed"),
        }
    }

    /// Stores `value` with the configured default TTL.
    pub async fn set_default(&self, key: &str, value: V) {
        let ttl = self.store.read().await.default_ttl();
        self.set(key, value, ttl).await;
    }

    // == Get ==
    /// Returns a copy of the cached value, or `None` if absent, expired or
    /// the key is invalid.
    pub async fn get(&self, key: &str) -> Option<V> {
        // Write lock: reads update LRU order and access counters.
        let result = self.store.write().await.get(key);
        result.unwrap_or_else(|error| {
            warn!(key, %error, "Cache get failed");
            None
        })
    }

    // == Has ==
    pub async fn has(&self, key: &str) -> bool {
        let result = self.store.write().await.has(key);
        result.unwrap_or_else(|error| {
            warn!(key, %error, "Cache has failed");
            false
        })
    }

    // == Delete ==
    /// Removes an entry. Returns whether one was present.
    pub async fn delete(&self, key: &str) -> bool {
        let result = self.store.write().await.delete(key);
        result.unwrap_or_else(|error| {
            warn!(key, %error, "Cache delete failed");
            false
        })
    }

    // == Clear ==
    pub async fn clear(&self) {
        self.store.write().await.clear();
        debug!("Cache cleared");
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    /// Runs one expiry sweep now. Returns the number of entries removed.
    pub async fn sweep_now(&self) -> usize {
        self.store.write().await.cleanup_expired()
    }

    // == Shutdown ==
    /// Stops the background sweep. Entries remain readable.
    pub fn shutdown(&self) {
        if let Some(sweep) = &self.sweep {
            sweep.0.abort();
            info!("Cache sweep stopped");
        }
    }
}
