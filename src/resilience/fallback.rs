//! Time-bounded fallback cache for degraded operation
//!
//! Stores the last good value per key so the executor can serve stale data
//! when the primary path is unavailable. Expiry is lazy: entries are dropped
//! when a read finds them stale. Last write for a key wins.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::FallbackConfig;

struct CacheEntry<T> {
    value: T,
    stored_at: Instant,
}

/// Shared keyed cache with a fixed TTL
pub struct FallbackCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> FallbackCache<T> {
    /// Create a cache with the given time-to-live
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Build a cache from fallback configuration
    pub fn from_config(config: &FallbackConfig) -> Self {
        Self::new(config.ttl())
    }

    /// Get the cached value for a key, if present and not stale
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                debug!(key = key, "Evicting stale fallback entry");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value under a key, overwriting unconditionally
    pub fn set(&self, key: &str, value: T) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Number of entries currently held (stale entries included until read)
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
