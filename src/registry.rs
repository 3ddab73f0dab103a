//! Resilience Registry
//!
//! Process-wide entry point handing out named components built from one
//! [`Config`]. Components with the same name are shared, so two call sites
//! asking for `rate_limiter("search")` draw from the same bucket.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::cache::Cache;
use crate::config::Config;
use crate::events::{tracing_sink, EventSink};
use crate::limiter::{BackpressureConfig, ConcurrencyLimiter, RateLimitConfig, TokenBucket};
use crate::retry::RetryPolicy;

// == Resilience Registry ==
#[derive(Clone)]
pub struct ResilienceRegistry {
    config: Arc<Config>,
    events: Arc<dyn EventSink>,
    breakers: CircuitBreakerRegistry,
    rate_limiters: Arc<Mutex<HashMap<String, Arc<TokenBucket>>>>,
    concurrency_limiters: Arc<Mutex<HashMap<String, ConcurrencyLimiter>>>,
}

impl ResilienceRegistry {
    /// Creates a registry that reports events through `tracing`.
    pub fn new(config: Config) -> Self {
        Self::with_sink(config, tracing_sink())
    }

    pub fn with_sink(config: Config, events: Arc<dyn EventSink>) -> Self {
        Self {
            breakers: CircuitBreakerRegistry::new(config.breaker, Arc::clone(&events)),
            config: Arc::new(config),
            events,
            rate_limiters: Arc::new(Mutex::new(HashMap::new())),
            concurrency_limiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.events)
    }

    // == Circuit Breakers ==
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn breaker(&self, name: &str) -> CircuitBreaker {
        self.breakers.breaker(name)
    }

    pub fn breaker_with(&self, name: &str, config: CircuitBreakerConfig) -> CircuitBreaker {
        self.breakers.breaker_with(name, config)
    }

    // == Cache ==
    /// Starts a new cache with the configured limits.
    ///
    /// Caches are not shared by name; each call owns a separate store.
    pub fn cache<V>(&self) -> Cache<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        Cache::start(self.config.cache, self.events())
    }

    // == Rate Limiters ==
    /// Returns the token bucket for `name`, starting it on first use.
    pub fn rate_limiter(&self, name: &str) -> Arc<TokenBucket> {
        self.rate_limiter_with(name, self.config.rate_limit)
    }

    /// Like [`rate_limiter`](Self::rate_limiter); the first config wins.
    pub fn rate_limiter_with(&self, name: &str, config: RateLimitConfig) -> Arc<TokenBucket> {
        let mut limiters = self.rate_limiters.lock();
        let bucket = limiters
            .entry(name.to_string())
            .or_insert_with(|| TokenBucket::start(name, config));
        Arc::clone(bucket)
    }

    // == Concurrency Limiters ==
    /// Returns the backpressure limiter for `name`, creating it on first use.
    pub fn concurrency_limiter(&self, name: &str) -> ConcurrencyLimiter {
        self.concurrency_limiter_with(name, self.config.backpressure)
    }

    /// Like [`concurrency_limiter`](Self::concurrency_limiter); the first config wins.
    pub fn concurrency_limiter_with(
        &self,
        name: &str,
        config: BackpressureConfig,
    ) -> ConcurrencyLimiter {
        let mut limiters = self.concurrency_limiters.lock();
        limiters
            .entry(name.to_string())
            .or_insert_with(|| ConcurrencyLimiter::new(name, config, self.events()))
            .clone()
    }

    // == Retry ==
    /// Retry policy with the configured numbers and no predicate.
    pub fn retry_policy<E>(&self) -> RetryPolicy<E> {
        RetryPolicy::new(self.config.retry)
    }

    /// Shuts down every token bucket, releasing queued callers.
    pub fn shutdown(&self) {
        for bucket in self.rate_limiters.lock().values() {
            bucket.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResilienceError;
    use crate::events::MemorySink;
    use std::time::Duration;

    fn registry() -> ResilienceRegistry {
        let mut config = Config::default();
        config.breaker.failure_threshold = 1;
        config.backpressure.max_concurrency = 2;
        ResilienceRegistry::with_sink(config, Arc::new(MemorySink::new()))
    }

    #[tokio::test]
    async fn test_components_shared_by_name() {
        let registry = registry();

        assert!(Arc::ptr_eq(
            &registry.rate_limiter("search"),
            &registry.rate_limiter("search")
        ));
        assert!(!Arc::ptr_eq(
            &registry.rate_limiter("search"),
            &registry.rate_limiter("index")
        ));

        let limiter = registry.concurrency_limiter("db");
        let _permit = limiter.acquire().await.unwrap();
        assert_eq!(registry.concurrency_limiter("db").active(), 1);
        assert_eq!(limiter.config().max_concurrency, 2);
    }

    #[tokio::test]
    async fn test_breaker_uses_configured_threshold() {
        let registry = registry();
        let _: Result<(), ResilienceError> = registry
            .breaker("db")
            .call(|| async { Err(ResilienceError::failed("down")) })
            .await;

        assert_eq!(registry.breakers().all().len(), 1);
        assert_eq!(
            registry.breakers().status("db").unwrap().state,
            crate::breaker::CircuitState::Open
        );
    }

    #[tokio::test]
    async fn test_explicit_configs() {
        let registry = registry();
        let bucket = registry.rate_limiter_with(
            "tight",
            RateLimitConfig {
                rate: 1,
                interval: Duration::from_secs(5),
            },
        );
        assert_eq!(bucket.config().rate, 1);
        assert_eq!(registry.rate_limiter("tight").config().rate, 1);

        let limiter = registry.concurrency_limiter_with(
            "serial",
            BackpressureConfig {
                max_concurrency: 1,
                max_queue: 0,
            },
        );
        assert_eq!(limiter.config().max_queue, 0);
    }

    #[tokio::test]
    async fn test_retry_policy_and_cache_from_config() {
        let registry = registry();
        let policy: RetryPolicy<ResilienceError> = registry.retry_policy();
        assert_eq!(policy.max_attempts(), 3);

        let cache: Cache<String> = registry.cache();
        cache.set_default("k", "v".to_string()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        cache.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_closes_buckets() {
        let registry = registry();
        let bucket = registry.rate_limiter("search");
        registry.shutdown();
        assert!(bucket.acquire().await.is_err());
    }
}
