//! Cache Statistics Module
//!
//! Advisory counters for observability. Never used in eviction decisions.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache contents and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently stored, expired or not
    pub total_keys: usize,
    /// Stored entries that have not expired
    pub active_keys: usize,
    /// Stored entries past expiry that no sweep or read has removed yet
    pub expired_keys: usize,
    /// Sum of reads over all stored entries
    pub total_accesses: u64,
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that found nothing, or found an expired entry
    pub misses: u64,
    /// Entries removed to make room for new keys
    pub evictions: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
