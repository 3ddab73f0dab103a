//! Cache Entry Module
//!
//! Defines a single cache entry with its expiry and access metadata.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A stored value plus expiry and access bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Absolute expiry time
    pub expires_at: Instant,
    /// Number of successful reads
    pub access_count: u64,
    /// Time of the last write or successful read
    pub last_accessed_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry that expires `ttl_seconds` from now.
    pub fn new(value: V, ttl_seconds: u64) -> Self {
        let now = Instant::now();
        Self {
            value,
            expires_at: now + Duration::from_millis(ttl_seconds.saturating_mul(1000)),
            access_count: 0,
            last_accessed_at: now,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches `expires_at`, so it
    /// is never visible for the full TTL plus one tick.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    // == Touch ==
    /// Records a read.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Instant::now();
    }

    // == Time To Live ==
    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_creation() {
        let entry = CacheEntry::new("test_value".to_string(), 60);

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.ttl_remaining(), Duration::from_secs(60));
        assert!(!entry.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expiration() {
        let entry = CacheEntry::new(1u32, 1);
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_updates_access_metadata() {
        let mut entry = CacheEntry::new(vec![1, 2, 3], 10);
        let written = entry.last_accessed_at;

        tokio::time::advance(Duration::from_millis(5)).await;
        entry.touch();
        entry.touch();

        assert_eq!(entry.access_count, 2);
        assert!(entry.last_accessed_at > written);
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let entry = CacheEntry::new("gone", 0);
        assert!(entry.is_expired());
    }
}
