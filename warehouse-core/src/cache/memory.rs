use std::collections::hash_map::Entry as MapEntry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::entry::CacheEntry;
use crate::cache::policy::{CountSize, EvictionPolicy, ExpirationPolicy, SizeOf};
use crate::cache::stats::{CacheStats, CacheStatsSnapshot};
use crate::error::CacheError;

/// Outcome of [`Cache::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was not previously present.
    Inserted,
    /// The key was present and its entry was replaced in place.
    Replaced,
    /// The value alone exceeds capacity; nothing was stored.
    Rejected,
}

/// An in-memory associative store with pluggable eviction and expiration, and
/// atomic hit/miss/insert/eviction counters.
///
/// All public operations take the same internal lock, including reads, because a
/// read also updates recency metadata for LRU/MRU eviction. Correctness is defined
/// by this serial semantics: the sequence of operations on one `Cache` is
/// linearizable.
///
/// # Examples
///
/// ```
/// use warehouse_core::cache::{Cache, EvictionPolicy};
///
/// let cache: Cache<u32, &str> = Cache::builder(5).eviction(EvictionPolicy::Lru).build();
/// cache.insert(1, "eka", &[]).unwrap();
/// assert_eq!(cache.find(&1), Some("eka"));
/// ```
pub struct Cache<K, V, S = CountSize> {
    capacity: usize,
    eviction: EvictionPolicy,
    expiration: ExpirationPolicy,
    sizer: S,
    stats: CacheStats,
    inner: Mutex<Inner<K, V>>,
}

struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    current_size: usize,
    next_seq: u64,
}

/// Builder for [`Cache`], mirroring the constructor-parameter configuration style
/// used throughout this crate instead of environment variables or config files.
pub struct CacheBuilder<S = CountSize> {
    capacity: usize,
    eviction: EvictionPolicy,
    expiration: ExpirationPolicy,
    sizer: S,
}

impl CacheBuilder<CountSize> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            eviction: EvictionPolicy::default(),
            expiration: ExpirationPolicy::default(),
            sizer: CountSize,
        }
    }
}

impl<S> CacheBuilder<S> {
    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    pub fn expiration(mut self, policy: ExpirationPolicy) -> Self {
        self.expiration = policy;
        self
    }

    pub fn size_fn<S2>(self, sizer: S2) -> CacheBuilder<S2> {
        CacheBuilder {
            capacity: self.capacity,
            eviction: self.eviction,
            expiration: self.expiration,
            sizer,
        }
    }

    pub fn build<K, V>(self) -> Cache<K, V, S> {
        Cache {
            capacity: self.capacity,
            eviction: self.eviction,
            expiration: self.expiration,
            sizer: self.sizer,
            stats: CacheStats::new(self.capacity),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                current_size: 0,
                next_seq: 0,
            }),
        }
    }
}

impl<K, V> Cache<K, V, CountSize>
where
    K: Eq + Hash + Clone,
{
    pub fn builder(capacity: usize) -> CacheBuilder<CountSize> {
        CacheBuilder::new(capacity)
    }

    /// Count-based cache with the given eviction policy and no expiration.
    pub fn new(capacity: usize, eviction: EvictionPolicy) -> Self {
        Self::builder(capacity).eviction(eviction).build()
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Eq + Hash + Clone,
    S: SizeOf<V>,
{
    /// Inserts `value` under `key` with the given tags, evicting per policy as
    /// needed to stay within capacity.
    pub fn insert(&self, key: K, value: V, tags: &[&str]) -> Result<InsertOutcome, CacheError> {
        let size = self.sizer.size_of(&value);
        if size > self.capacity {
            self.stats.record_failed_insert();
            return Err(CacheError::CacheFull {
                capacity: self.capacity,
                size,
            });
        }

        let mut inner = self.inner.lock();
        let replaced = if let Some(old) = inner.entries.remove(&key) {
            inner.current_size -= self.sizer.size_of(&old.value);
            true
        } else {
            false
        };

        while inner.current_size + size > self.capacity {
            if !evict_one(&mut inner, self.eviction, &self.sizer) {
                break;
            }
            self.stats.record_eviction();
        }

        if inner.current_size + size > self.capacity {
            // Capacity could not be freed (e.g. the map is already empty); refuse.
            self.stats.record_failed_insert();
            self.stats.set_current_size(inner.current_size);
            return Ok(InsertOutcome::Rejected);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let expires_at = match self.expiration {
            ExpirationPolicy::Instant(dur) => Some(Instant::now() + dur),
            _ => None,
        };
        let tags: HashSet<String> = tags.iter().map(|t| t.to_string()).collect();
        inner.entries.insert(key, CacheEntry::new(value, tags, seq, expires_at));
        inner.current_size += size;
        self.stats.set_current_size(inner.current_size);
        self.stats.record_insert();

        Ok(if replaced {
            InsertOutcome::Replaced
        } else {
            InsertOutcome::Inserted
        })
    }

    /// Looks up `key`, dropping it first if it has expired under an `Instant`
    /// expiration policy. Updates recency metadata on a hit.
    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if matches!(self.expiration, ExpirationPolicy::Instant(_)) {
            if let Some(entry) = inner.entries.get(key) {
                if entry.is_expired(now) {
                    let entry = inner.entries.remove(key).unwrap();
                    inner.current_size -= self.sizer.size_of(&entry.value);
                    self.stats.set_current_size(inner.current_size);
                    self.stats.record_eviction();
                    self.stats.record_miss();
                    return None;
                }
            }
        }

        let seq = inner.next_seq;
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_use_seq = seq;
                inner.next_seq += 1;
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Removes every live entry whose tag-set contains `tag`, and, for an
    /// `Instant` expiration policy, any entry whose expiration instant has
    /// already passed.
    pub fn expire(&self, tag: &str) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let sweep_expired = matches!(self.expiration, ExpirationPolicy::Instant(_));
        let doomed: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.has_tag(tag) || (sweep_expired && entry.is_expired(now)))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            if let Some(entry) = inner.entries.remove(&key) {
                inner.current_size -= self.sizer.size_of(&entry.value);
                self.stats.record_eviction();
            }
        }
        self.stats.set_current_size(inner.current_size);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Keys in most-recently-used to least-recently-used order, for test
    /// assertions and diagnostics (not required for production call sites).
    pub fn keys_by_recency(&self) -> Vec<K> {
        let inner = self.inner.lock();
        let mut keys: Vec<(&K, u64)> = inner.entries.iter().map(|(k, e)| (k, e.last_use_seq)).collect();
        keys.sort_by(|a, b| b.1.cmp(&a.1));
        keys.into_iter().map(|(k, _)| k.clone()).collect()
    }
}

/// Picks and removes one victim per `policy`. Returns `false` if the map was
/// already empty.
fn evict_one<K, V, S>(inner: &mut Inner<K, V>, policy: EvictionPolicy, sizer: &S) -> bool
where
    K: Eq + Hash + Clone,
    S: SizeOf<V>,
{
    if inner.entries.is_empty() {
        return false;
    }

    let victim: K = match policy {
        EvictionPolicy::Lru => inner
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_use_seq)
            .map(|(k, _)| k.clone())
            .unwrap(),
        EvictionPolicy::Mru => inner
            .entries
            .iter()
            .max_by_key(|(_, e)| e.last_use_seq)
            .map(|(k, _)| k.clone())
            .unwrap(),
        EvictionPolicy::Fifo => inner
            .entries
            .iter()
            .min_by_key(|(_, e)| e.insertion_seq)
            .map(|(k, _)| k.clone())
            .unwrap(),
        EvictionPolicy::Random => {
            let idx = fastrand::usize(..inner.entries.len());
            inner.entries.keys().nth(idx).cloned().unwrap()
        }
    };

    if let MapEntry::Occupied(occupied) = inner.entries.entry(victim) {
        let (_, entry) = occupied.remove_entry();
        inner.current_size -= sizer.size_of(&entry.value);
    }
    true
}
