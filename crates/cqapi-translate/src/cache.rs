//! Caching of concept listings fetched during the descendant pre-pass.
//!
//! Listings are large and change rarely, so repeated translations into the
//! same dataset reuse them. Thread-safe using `Mutex` for LRU operations.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::config::CacheConfig;

#[derive(Debug, Clone)]
struct CacheEntry {
    ids: HashSet<String>,
    created_at: Instant,
}

impl CacheEntry {
    fn new(ids: HashSet<String>) -> Self {
        Self {
            ids,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Thread-safe LRU cache with TTL expiration, keyed by root concept id.
///
/// Each entry holds every id listed below that root.
///
/// # Example
///
/// ```rust
/// use cqapi_translate::{CacheConfig, ListingCache};
/// use std::collections::HashSet;
///
/// let cache = ListingCache::new(CacheConfig::default());
/// let ids: HashSet<String> = ["dataset2.icd.a00-b99.a00".to_string()].into_iter().collect();
/// cache.set("dataset2.icd".to_string(), ids.clone());
/// assert_eq!(cache.get("dataset2.icd"), Some(ids));
/// ```
pub struct ListingCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl ListingCache {
    /// Creates a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_capacity(config.max_entries, config.ttl)
    }

    /// Creates a cache with custom capacity and TTL.
    pub fn with_capacity(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Gets the listed ids below a root concept.
    ///
    /// Expired entries are evicted and reported as misses.
    pub fn get(&self, root_concept_id: &str) -> Option<HashSet<String>> {
        let mut cache = self.inner.lock().ok()?;

        if let Some(entry) = cache.get(root_concept_id) {
            if entry.is_expired(self.ttl) {
                cache.pop(root_concept_id);
                return None;
            }
            return Some(entry.ids.clone());
        }

        None
    }

    /// Stores the listed ids below a root concept.
    pub fn set(&self, root_concept_id: String, ids: HashSet<String>) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(root_concept_id, CacheEntry::new(ids));
        }
    }

    /// Returns the number of entries, expired ones included.
    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(cache) => cache.len(),
            _ => 0,
        }
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.clear();
        }
    }

    /// Removes expired entries.
    pub fn cleanup_expired(&self) {
        if let Ok(mut cache) = self.inner.lock() {
            let ttl = self.ttl;
            let expired: Vec<String> = cache
                .iter()
                .filter(|(_, entry)| entry.is_expired(ttl))
                .map(|(key, _)| key.clone())
                .collect();

            for key in expired {
                cache.pop(&key);
            }
        }
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        match self.inner.lock() {
            Ok(cache) => {
                let total = cache.len();
                let expired = cache
                    .iter()
                    .filter(|(_, entry)| entry.is_expired(self.ttl))
                    .count();

                CacheStats {
                    total_entries: total,
                    expired_entries: expired,
                    valid_entries: total.saturating_sub(expired),
                }
            }
            _ => CacheStats::default(),
        }
    }
}

impl std::fmt::Debug for ListingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingCache")
            .field("entries", &self.stats().total_entries)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Statistics about the cache state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries in the cache.
    pub total_entries: usize,
    /// Number of expired entries (not yet cleaned up).
    pub expired_entries: usize,
    /// Number of valid (non-expired) entries.
    pub valid_entries: usize,
}
