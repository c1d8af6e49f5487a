//! Associative stores with pluggable eviction and expiration.
//!
//! - [`Cache`] — the full policy-pluggable in-memory cache (eviction ∈ LRU/MRU/
//!   FIFO/Random, expiration ∈ none/static/instant, pluggable size accounting).
//! - [`TimedCache`] — a simpler LRU + per-entry-TTL cache for callers that don't
//!   need policy pluggability.
//! - [`file::FileCache`] — a persistent on-disk variant with the same hit/miss
//!   contract as `Cache`.

mod entry;
pub mod file;
mod memory;
mod policy;
mod stats;
mod timed;

pub use file::FileCache;
pub use memory::{Cache, CacheBuilder, InsertOutcome};
pub use policy::{CountSize, EvictionPolicy, ExpirationPolicy, SizeOf};
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use timed::TimedCache;
