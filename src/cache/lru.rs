//! LRU Tracker Module
//!
//! Orders keys by recency of access for least-recently-used eviction.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access order with a monotonically increasing tick per touch.
///
/// The smallest tick is the least recently used key. Ties cannot occur, so
/// eviction order is deterministic even when two accesses share a timestamp.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// tick -> key, oldest first
    order: BTreeMap<u64, String>,
    /// key -> its current tick
    ticks: HashMap<String, u64>,
    next_tick: u64,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, adding it if new.
    pub fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;

        match self.ticks.get_mut(key) {
            Some(previous) => {
                self.order.remove(previous);
                *previous = tick;
            }
            None => {
                self.ticks.insert(key.to_string(), tick);
            }
        }
        self.order.insert(tick, key.to_string());
    }

    // == Remove ==
    /// Stops tracking a key.
    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    /// Least recently used key, without removing it.
    pub fn peek_oldest(&self) -> Option<&str> {
        self.order.values().next().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.ticks.clear();
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ticks.contains_key(key)
    }
}
