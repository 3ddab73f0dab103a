//! Cache Module
//!
//! In-memory key-value cache with TTL expiration and LRU eviction.
//!
//! [`CacheStore`] is the synchronous engine and reports errors. [`Cache`] is
//! the shared async handle callers use: it owns the background sweep and
//! swallows every store error, since a cache failure must never fail the
//! caller's primary operation.

mod cached;
mod entry;
mod facade;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use cached::Cached;
pub use entry::CacheEntry;
pub use facade::{Cache, CacheConfig};
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{validate_key, CacheStore};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 250;
