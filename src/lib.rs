//! # Warehouse
//!
//! A small toolkit of shared-resource primitives: caches with pluggable
//! eviction and expiration, bounded object pools, and cancellable task
//! coordination. This crate re-exports [`warehouse_core`] at the top level so
//! callers depend on a single package.
//!
//! ## Quick start
//!
//! ```rust
//! use warehouse::cache::{Cache, EvictionPolicy};
//!
//! let cache: Cache<u32, &str> = Cache::builder(2).eviction(EvictionPolicy::Lru).build();
//! cache.insert(1, "eka", &[]).unwrap();
//! assert_eq!(cache.find(&1), Some("eka"));
//! ```
//!
//! ## Bounded pool
//!
//! ```rust
//! use warehouse::pool::{Pool, PoolInit};
//!
//! let pool: Pool<String> = Pool::new(2, 4, PoolInit::Sequential, || Ok(String::new())).unwrap();
//! let mut handle = pool.get().unwrap();
//! handle.push_str("borrowed");
//! assert_eq!(&*handle, "borrowed");
//! ```
//!
//! ## Task group
//!
//! ```rust
//! use warehouse::task::TaskGroup;
//!
//! let group = TaskGroup::new(4);
//! group.add("job", |_token| Ok(()));
//! assert!(group.wait().is_ok());
//! ```

pub use warehouse_core::*;
