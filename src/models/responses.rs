//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::breaker::CircuitStatus;
use crate::cache::CacheStats;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Entries currently stored, including expired ones not yet swept
    pub total_keys: usize,
    pub active_keys: usize,
    pub expired_keys: usize,
    /// Sum of per-entry read counts
    pub total_accesses: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            total_keys: stats.total_keys,
            active_keys: stats.active_keys,
            expired_keys: stats.expired_keys,
            total_accesses: stats.total_accesses,
        }
    }
}

/// Response body for the breaker listing (GET /breakers)
#[derive(Debug, Clone, Serialize)]
pub struct BreakersResponse {
    pub count: usize,
    pub breakers: Vec<CircuitStatus>,
}

impl BreakersResponse {
    pub fn new(breakers: Vec<CircuitStatus>) -> Self {
        Self {
            count: breakers.len(),
            breakers,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            total_keys: 100,
            ..CacheStats::default()
        };
        let resp = StatsResponse::from(stats);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.evictions, 5);
    }

    #[test]
    fn test_stats_response_zero_requests() {
        let resp = StatsResponse::from(CacheStats::default());
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_breakers_response_serialize() {
        let resp = BreakersResponse::new(vec![CircuitStatus {
            name: "db".to_string(),
            state: CircuitState::HalfOpen,
            failure_count: 3,
            success_count: 10,
            last_failure_at: None,
        }]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["breakers"][0]["state"], "HALF_OPEN");
        assert_eq!(json["breakers"][0]["failure_count"], 3);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
