//! Bounded pools of reusable items.
//!
//! - [`Pool`] — items handed out exclusively, by value, via a [`Handle`] that
//!   returns the item on drop.
//! - [`WorkerPool`] — items shared between the pool and their borrower via
//!   [`WorkerHandle`], so cancellation can reach work in flight.

mod handle;
mod object_pool;
mod worker;

pub use handle::Handle;
pub use object_pool::{Pool, PoolInit};
pub use worker::{Cancellable, WorkerHandle, WorkerPool};
