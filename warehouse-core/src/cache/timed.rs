use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cache::stats::{CacheStats, CacheStatsSnapshot};

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
    last_use_seq: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    next_seq: u64,
}

/// A simplified LRU + per-entry-TTL cache, for callers that don't need the
/// policy pluggability of [`crate::cache::Cache`].
///
/// `insert` rejects a key that's already present and not yet expired; `find`
/// silently drops an expired entry instead of returning it.
///
/// # Examples
///
/// ```
/// use warehouse_core::cache::TimedCache;
/// use std::time::Duration;
///
/// let cache: TimedCache<u32, &str> = TimedCache::new(10);
/// assert!(cache.insert(1, "eka", None));
/// assert_eq!(cache.find(&1), Some("eka"));
/// ```
pub struct TimedCache<K, V> {
    capacity: usize,
    default_ttl: Option<Duration>,
    stats: CacheStats,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self::with_default_ttl(capacity, None)
    }

    pub fn with_default_ttl(capacity: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            capacity,
            default_ttl,
            stats: CacheStats::new(capacity),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Inserts with an explicit TTL override, falling back to the cache's
    /// default TTL when `None` is given *and* no default was configured (no
    /// expiration in that case).
    pub fn insert(&self, key: K, value: V, ttl: Option<Duration>) -> bool {
        let ttl = ttl.or(self.default_ttl);
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if let Some(existing) = inner.entries.get(&key) {
            if !is_expired(existing, now) {
                self.stats.record_failed_insert();
                return false;
            }
            inner.entries.remove(&key);
        }

        if inner.entries.len() >= self.capacity {
            let expired: Vec<K> = inner
                .entries
                .iter()
                .filter(|(_, e)| is_expired(e, now))
                .map(|(k, _)| k.clone())
                .collect();
            for k in expired {
                inner.entries.remove(&k);
                self.stats.record_eviction();
            }
        }

        if inner.entries.len() >= self.capacity {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_use_seq)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&lru_key);
                self.stats.record_eviction();
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: ttl.map(|d| now + d),
                last_use_seq: seq,
            },
        );
        self.stats.set_current_size(inner.entries.len());
        self.stats.record_insert();
        true
    }

    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match inner.entries.get(key) {
            Some(entry) if is_expired(entry, now) => {
                inner.entries.remove(key);
                self.stats.set_current_size(inner.entries.len());
                self.stats.record_eviction();
                self.stats.record_miss();
                None
            }
            Some(_) => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                let entry = inner.entries.get_mut(key).unwrap();
                entry.last_use_seq = seq;
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

fn is_expired<V>(entry: &Entry<V>, now: Instant) -> bool {
    matches!(entry.expires_at, Some(at) if now >= at)
}
