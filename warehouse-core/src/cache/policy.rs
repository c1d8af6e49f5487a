use std::time::Duration;

/// Determines which live entry is dropped when capacity would be exceeded.
///
/// LRU/MRU/FIFO break ties using each entry's insertion-order sequence number;
/// `Random` picks uniformly among all live entries.
///
/// # Examples
///
/// ```
/// use warehouse_core::cache::EvictionPolicy;
///
/// let policy = EvictionPolicy::default();
/// assert_eq!(policy, EvictionPolicy::Lru);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    #[default]
    Lru,
    Mru,
    Fifo,
    Random,
}

/// Controls whether and how entries self-expire.
///
/// * `None` — entries never expire on their own.
/// * `Static` — entries carry only an insertion time; bulk removal happens through
///   [`crate::cache::Cache::expire`] regardless of age.
/// * `Instant` — entries carry an expiration instant (`insertion + duration`); expired
///   entries are refused on read and swept by `expire` as well.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpirationPolicy {
    None,
    Static,
    Instant(Duration),
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        ExpirationPolicy::None
    }
}

/// Seam for pluggable size accounting.
///
/// The default implementation treats every entry as one unit (count-based
/// accounting); implement this for `V` to account for actual payload size instead.
///
/// This must be a pure function: cache internals call it while holding the cache's
/// lock, so it must never block or re-enter the cache.
pub trait SizeOf<V: ?Sized> {
    fn size_of(&self, value: &V) -> usize;
}

/// Count-based accounting: every entry costs exactly one unit of capacity.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountSize;

impl<V: ?Sized> SizeOf<V> for CountSize {
    fn size_of(&self, _value: &V) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_policy_default_is_lru() {
        assert_eq!(EvictionPolicy::default(), EvictionPolicy::Lru);
    }

    #[test]
    fn count_size_is_always_one() {
        let sizer = CountSize;
        assert_eq!(sizer.size_of(&"hello"), 1);
        assert_eq!(sizer.size_of(&12345), 1);
    }
}
