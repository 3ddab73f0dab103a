//! Configuration Module
//!
//! Loads toolkit defaults from environment variables. Every component also
//! accepts its config struct directly, so this is only the process-wide
//! starting point.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::breaker::CircuitBreakerConfig;
use crate::cache::CacheConfig;
use crate::limiter::{BackpressureConfig, RateLimitConfig};
use crate::retry::RetryConfig;

/// Toolkit configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub backpressure: BackpressureConfig,
    pub rate_limit: RateLimitConfig,
    /// Diagnostics server port
    pub server_port: u16,
}

/// Reads and parses `key`, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_KEYS` - Maximum cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_SWEEP_INTERVAL` - Expiry sweep period in seconds (default: 1)
    /// - `BREAKER_FAILURE_THRESHOLD` - Failures before opening (default: 5)
    /// - `BREAKER_RESET_TIMEOUT_MS` - Open-state cooldown (default: 30000)
    /// - `RETRY_MAX_ATTEMPTS` - Total attempts per call (default: 3)
    /// - `RETRY_DELAY_MS` - Delay before the first retry (default: 100)
    /// - `RETRY_BACKOFF_MULTIPLIER` - Delay growth factor (default: 2.0)
    /// - `BACKPRESSURE_MAX_CONCURRENCY` - In-flight cap (default: 10)
    /// - `BACKPRESSURE_MAX_QUEUE` - Wait queue cap, 0 for unbounded (default: 100)
    /// - `RATE_LIMIT_RATE` - Tokens per interval (default: 10)
    /// - `RATE_LIMIT_INTERVAL_MS` - Refill interval (default: 1000)
    /// - `SERVER_PORT` - Diagnostics server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache: CacheConfig {
                max_keys: env_or("CACHE_MAX_KEYS", defaults.cache.max_keys),
                default_ttl: env_or("CACHE_DEFAULT_TTL", defaults.cache.default_ttl),
                sweep_interval: Duration::from_secs(env_or(
                    "CACHE_SWEEP_INTERVAL",
                    defaults.cache.sweep_interval.as_secs(),
                )),
            },
            breaker: CircuitBreakerConfig {
                failure_threshold: env_or(
                    "BREAKER_FAILURE_THRESHOLD",
                    defaults.breaker.failure_threshold,
                ),
                reset_timeout: Duration::from_millis(env_or(
                    "BREAKER_RESET_TIMEOUT_MS",
                    defaults.breaker.reset_timeout.as_millis() as u64,
                )),
            },
            retry: RetryConfig {
                max_attempts: env_or("RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts),
                delay: Duration::from_millis(env_or(
                    "RETRY_DELAY_MS",
                    defaults.retry.delay.as_millis() as u64,
                )),
                backoff_multiplier: env_or(
                    "RETRY_BACKOFF_MULTIPLIER",
                    defaults.retry.backoff_multiplier,
                ),
            },
            backpressure: BackpressureConfig {
                max_concurrency: env_or(
                    "BACKPRESSURE_MAX_CONCURRENCY",
                    defaults.backpressure.max_concurrency,
                ),
                max_queue: env_or("BACKPRESSURE_MAX_QUEUE", defaults.backpressure.max_queue),
            },
            rate_limit: RateLimitConfig {
                rate: env_or("RATE_LIMIT_RATE", defaults.rate_limit.rate),
                interval: Duration::from_millis(env_or(
                    "RATE_LIMIT_INTERVAL_MS",
                    defaults.rate_limit.interval.as_millis() as u64,
                )),
            },
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            backpressure: BackpressureConfig::default(),
            rate_limit: RateLimitConfig::default(),
            server_port: 3000,
        }
    }
}
