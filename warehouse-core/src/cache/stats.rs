use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Persistent cache counters, recorded since the cache's construction.
///
/// Every counter is an atomic so a snapshot can be taken without holding the
/// cache's own lock: statistics are observational, not synchronization-critical.
#[derive(Debug)]
pub struct CacheStats {
    start_time: Instant,
    capacity: usize,
    current_size: AtomicUsize,
    inserts: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    failed_inserts: AtomicU64,
}

impl CacheStats {
    pub fn new(capacity: usize) -> Self {
        Self {
            start_time: Instant::now(),
            capacity,
            current_size: AtomicUsize::new(0),
            inserts: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            failed_inserts: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failed_insert(&self) {
        self.failed_inserts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_current_size(&self, size: usize) {
        self.current_size.store(size, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            start_time: self.start_time,
            capacity: self.capacity,
            current_size: self.current_size.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            failed_inserts: self.failed_inserts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`], safe to hand to callers outside any lock.
#[derive(Clone, Copy, Debug)]
pub struct CacheStatsSnapshot {
    pub start_time: Instant,
    pub capacity: usize,
    pub current_size: usize,
    pub inserts: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub failed_inserts: u64,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_zero_with_no_accesses() {
        let stats = CacheStats::new(10);
        assert_eq!(stats.snapshot().hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_reflects_recorded_accesses() {
        let stats = CacheStats::new(10);
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        let snap = stats.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate() - 0.6666).abs() < 0.001);
    }
}
