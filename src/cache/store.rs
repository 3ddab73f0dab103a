//! Cache Store Module
//!
//! Synchronous cache engine combining HashMap storage with LRU tracking and
//! TTL expiration. Errors are reported to the caller; the async [`Cache`]
//! facade is what absorbs them.
//!
//! [`Cache`]: crate::cache::Cache

use std::collections::HashMap;

use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheStats, LruTracker, MAX_KEY_LENGTH};
use crate::error::{CacheError, Result};

// == Key Validation ==
/// Keys must be non-empty and at most [`MAX_KEY_LENGTH`] bytes.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

// == Cache Store ==
/// Cache storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Maximum number of entries allowed
    max_keys: usize,
    /// TTL in seconds used by `set_default`
    default_ttl: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a store holding at most `max_keys` entries (minimum 1).
    pub fn new(max_keys: usize, default_ttl: u64) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            max_keys: max_keys.max(1),
            default_ttl,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    // == Set ==
    /// Stores a value that expires `ttl_seconds` from now.
    ///
    /// Overwriting an existing key resets its TTL. When the store is full and
    /// the key is new, the least recently used entry is evicted first and its
    /// key is returned.
    pub fn set(&mut self, key: &str, value: V, ttl_seconds: u64) -> Result<Option<String>> {
        validate_key(key)?;

        let mut evicted = None;
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_keys {
            let oldest = self.lru.evict_oldest().ok_or_else(|| {
                CacheError::Internal("store is full but no entry is tracked".to_string())
            })?;
            self.entries.remove(&oldest);
            self.evictions += 1;
            evicted = Some(oldest);
        }

        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl_seconds));
        self.lru.touch(key);

        Ok(evicted)
    }

    // == Get ==
    /// Returns a copy of the value if present and not expired.
    ///
    /// An expired entry is removed on the spot and reported as absent.
    pub fn get(&mut self, key: &str) -> Result<Option<V>> {
        validate_key(key)?;

        if self.remove_if_expired(key) {
            self.misses += 1;
            return Ok(None);
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch();
                self.lru.touch(key);
                self.hits += 1;
                Ok(Some(entry.value.clone()))
            }
            None => {
                self.misses += 1;
                Ok(None)
            }
        }
    }

    // == Has ==
    /// Whether a live entry exists. Does not count as an access.
    pub fn has(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;

        if self.remove_if_expired(key) {
            return Ok(false);
        }
        Ok(self.entries.contains_key(key))
    }

    // == Delete ==
    /// Removes an entry. Returns whether one was present.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
        }
        Ok(removed)
    }

    // == Clear ==
    /// Removes every entry. Lifetime counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    fn remove_if_expired(&mut self, key: &str) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired());
        if expired {
            self.entries.remove(key);
            self.lru.remove(key);
        }
        expired
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.lru.remove(key);
        }

        expired_keys.len()
    }

    // == Stats ==
    /// Returns a statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let expired_keys = self
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .count();

        CacheStats {
            total_keys: self.entries.len(),
            active_keys: self.entries.len() - expired_keys,
            expired_keys,
            total_accesses: self.entries.values().map(|entry| entry.access_count).sum(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::advance;

    fn store(max_keys: usize) -> CacheStore<String> {
        CacheStore::new(max_keys, 300)
    }

    fn set(store: &mut CacheStore<String>, key: &str, value: &str) {
        store.set(key, value.to_string(), 300).unwrap();
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = store(100);

        set(&mut store, "key1", "value1");
        assert_eq!(store.get("key1").unwrap().as_deref(), Some("value1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = store(100);
        assert_eq!(store.get("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_store_delete() {
        let mut store = store(100);

        set(&mut store, "key1", "value1");
        assert!(store.delete("key1").unwrap());
        assert!(!store.delete("key1").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = store(100);

        set(&mut store, "key1", "value1");
        set(&mut store, "key1", "value2");

        assert_eq!(store.get("key1").unwrap().as_deref(), Some("value2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_returned_value_is_independent_copy() {
        let mut store: CacheStore<Vec<u32>> = CacheStore::new(10, 300);
        store.set("list", vec![1, 2, 3], 300).unwrap();

        let mut first = store.get("list").unwrap().unwrap();
        first.push(4);

        assert_eq!(store.get("list").unwrap().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let mut store = store(100);
        store.set("key1", "value1".to_string(), 1).unwrap();

        advance(Duration::from_millis(500)).await;
        assert!(store.has("key1").unwrap());

        advance(Duration::from_millis(600)).await;
        assert!(!store.has("key1").unwrap());
        assert_eq!(store.get("key1").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = store(3);

        set(&mut store, "key1", "value1");
        set(&mut store, "key2", "value2");
        set(&mut store, "key3", "value3");

        let evicted = store.set("key4", "value4".to_string(), 300).unwrap();
        assert_eq!(evicted.as_deref(), Some("key1"));
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("key1").unwrap(), None);
        assert!(store.has("key4").unwrap());
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let mut store = store(3);

        set(&mut store, "key1", "value1");
        set(&mut store, "key2", "value2");
        set(&mut store, "key3", "value3");
        store.get("key1").unwrap();

        let evicted = store.set("key4", "value4".to_string(), 300).unwrap();
        assert_eq!(evicted.as_deref(), Some("key2"));
        assert!(store.has("key1").unwrap());
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let mut store = store(2);

        set(&mut store, "a", "1");
        set(&mut store, "b", "2");
        let evicted = store.set("a", "3".to_string(), 300).unwrap();

        assert_eq!(evicted, None);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_stats() {
        let mut store = store(100);

        store.set("short", "v".to_string(), 1).unwrap();
        store.set("long", "v".to_string(), 60).unwrap();
        store.get("long").unwrap();
        store.get("long").unwrap();
        store.get("missing").unwrap();

        advance(Duration::from_secs(2)).await;
        let stats = store.stats();
        assert_eq!(stats.total_keys, 2);
        assert_eq!(stats.active_keys, 1);
        assert_eq!(stats.expired_keys, 1);
        assert_eq!(stats.total_accesses, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_cleanup_expired() {
        let mut store = store(100);

        store.set("key1", "value1".to_string(), 1).unwrap();
        store.set("key2", "value2".to_string(), 10).unwrap();

        advance(Duration::from_millis(1100)).await;

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.has("key2").unwrap());
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let mut store = store(100);
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);

        assert!(matches!(
            store.set("", "v".to_string(), 10),
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(
            store.set(&long_key, "v".to_string(), 10),
            Err(CacheError::InvalidKey(_))
        ));
        assert!(store.set(&"x".repeat(MAX_KEY_LENGTH), "v".to_string(), 10).is_ok());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut store = store(10);
        set(&mut store, "a", "1");
        set(&mut store, "b", "2");

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.get("a").unwrap(), None);
    }
}
