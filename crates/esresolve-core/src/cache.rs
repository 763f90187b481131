//! Bounded resource cache for fetched remote modules.
//!
//! Least-recently-used eviction keeps the cache at its capacity; an optional
//! time-to-live expires entries independently of capacity. A `get` promotes
//! the entry but does not extend its lifetime: age is measured from the
//! last `set`.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use crate::config::CacheConfig;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Thread-safe LRU cache with optional TTL, keyed by an opaque string.
#[derive(Debug)]
pub struct ResourceCache<V> {
    entries: Mutex<LruCache<String, Entry<V>>>,
    ttl: Option<Duration>,
}

impl<V: Clone> ResourceCache<V> {
    /// Create a cache holding at most `max_size` entries (minimum 1).
    #[must_use]
    pub fn new(max_size: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_size, config.ttl())
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry<V>>> {
        // The table stays consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(entry.stored_at) >= ttl)
    }

    /// Look up a value, promoting it to most-recently-used.
    ///
    /// Expired entries are removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let expired = self.is_expired(entries.peek(key)?, Instant::now());
        if expired {
            entries.pop(key);
            debug!(key, "cache entry expired");
            return None;
        }
        debug!(key, "cache hit");
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or replace a value as most-recently-used, evicting the
    /// least-recently-used entry when full.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let entry = Entry {
            value,
            stored_at: Instant::now(),
        };
        let mut entries = self.lock();
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                debug!(key = %evicted, "cache evicted least-recently-used entry");
            }
        }
    }

    /// Remove every expired entry, returning how many were removed.
    pub fn prune(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Instant::now();
        let mut entries = self.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "pruned expired cache entries");
        }
        expired.len()
    }

    /// Remove one entry.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().pop(key).map(|entry| entry.value)
    }

    /// Whether `key` is stored, without promoting it. Expired entries count
    /// until they are touched or pruned.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

/// Deterministic cache key for a URL plus parameters.
///
/// Parameters are sorted and form-encoded, so the same set in any order
/// yields the same key.
#[must_use]
pub fn cache_key(url: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let mut sorted = params.to_vec();
    sorted.sort_unstable();
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(sorted)
        .finish();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_lru_not_fifo() {
        let cache = ResourceCache::new(2, None);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        assert_eq!(cache.get("a"), None, "a is evicted first");

        assert_eq!(cache.get("b"), Some(2));
        cache.set("d", 4);
        assert_eq!(cache.get("c"), None, "c was least recently used");
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("d"), Some(4));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_update_existing_key_does_not_evict() {
        let cache = ResourceCache::new(2, None);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_ttl_expiry_on_access() {
        let cache = ResourceCache::new(8, Some(Duration::from_millis(20)));
        cache.set("https://cdn/x.js", "x".to_string());
        assert_eq!(cache.get("https://cdn/x.js").as_deref(), Some("x"));

        sleep(Duration::from_millis(40));
        assert_eq!(cache.get("https://cdn/x.js"), None);
        assert!(!cache.contains("https://cdn/x.js"));
        assert_eq!(cache.prune(), 0, "already removed on access");
    }

    #[test]
    fn test_prune_counts_expired() {
        let cache = ResourceCache::new(8, Some(Duration::from_millis(20)));
        cache.set("old-1", 1);
        cache.set("old-2", 2);
        sleep(Duration::from_millis(40));
        cache.set("fresh", 3);

        assert_eq!(cache.prune(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(3));
        assert_eq!(cache.prune(), 0);
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let cache = ResourceCache::new(1, None);
        cache.set("k", 1);
        assert_eq!(cache.prune(), 0);
        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = ResourceCache::new(0, None);
        assert_eq!(cache.capacity(), 1);
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = ResourceCache::new(4, None);
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_key_is_order_independent() {
        let a = cache_key("https://esm.sh/react", &[("target", "es2020"), ("dev", "1")]);
        let b = cache_key("https://esm.sh/react", &[("dev", "1"), ("target", "es2020")]);
        assert_eq!(a, b);
        assert_eq!(a, "https://esm.sh/react?dev=1&target=es2020");
        assert_eq!(cache_key("https://esm.sh/react", &[]), "https://esm.sh/react");
        assert_eq!(
            cache_key("https://x/y?v=1", &[("q", "a b")]),
            "https://x/y?v=1&q=a+b"
        );
    }
}
