use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, PoolError};

/// An item that a [`WorkerPool`] can ask to stop mid-work.
///
/// Unlike [`crate::pool::Pool`], a worker pool retains a shared reference to
/// every live item — including ones currently checked out — so that
/// [`WorkerPool::cancel_all`] can reach them. `cancel` therefore takes `&self`
/// rather than `&mut self`: implementors signal cancellation through their own
/// interior mutability (an atomic flag, a channel close, …).
pub trait Cancellable {
    fn cancel(&self);
}

struct State<T> {
    slots: HashMap<u64, Arc<T>>,
    free_ids: Vec<u64>,
    next_id: u64,
    current_size: usize,
    in_use: usize,
    max_reached: usize,
    shutdown: bool,
}

struct Inner<T> {
    initial_size: usize,
    max_size: usize,
    shrink_step: usize,
    factory: Box<dyn Fn() -> Result<T, Error> + Send + Sync>,
    state: Mutex<State<T>>,
    condvar: Condvar,
}

/// A bounded pool of shared, cancellable worker items.
///
/// Checked-out items remain reachable from the pool (via [`Arc`] aliasing) so
/// that [`WorkerPool::cancel_all`] and [`WorkerPool::shutdown`] can act on
/// work in flight, not just on idle items. When the pool has grown beyond
/// `initial_size` and a release would leave it more than `shrink_step` idle
/// items oversubscribed, the released item is destroyed instead of freed,
/// letting the pool shrink back toward its floor under light load.
pub struct WorkerPool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkerPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Cancellable + Send + Sync + 'static> WorkerPool<T> {
    pub fn new<F>(
        initial_size: usize,
        max_size: usize,
        shrink_step: usize,
        factory: F,
    ) -> Result<Self, PoolError>
    where
        F: Fn() -> Result<T, Error> + Send + Sync + 'static,
    {
        let initial_size = initial_size.max(1);
        let max_size = max_size.max(initial_size);
        let shrink_step = shrink_step.max(1);

        let mut slots = HashMap::with_capacity(initial_size);
        let mut free_ids = Vec::with_capacity(initial_size);
        for id in 0..initial_size as u64 {
            let item = factory().map_err(PoolError::Factory)?;
            slots.insert(id, Arc::new(item));
            free_ids.push(id);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                initial_size,
                max_size,
                shrink_step,
                factory: Box::new(factory),
                state: Mutex::new(State {
                    slots,
                    free_ids,
                    next_id: initial_size as u64,
                    current_size: initial_size,
                    in_use: 0,
                    max_reached: initial_size,
                    shutdown: false,
                }),
                condvar: Condvar::new(),
            }),
        })
    }

    /// Blocks until a worker is available. Fails with [`PoolError::Shutdown`]
    /// once [`WorkerPool::shutdown`] has been called.
    pub fn reserve(&self) -> Result<WorkerHandle<T>, PoolError> {
        let mut guard = self.inner.state.lock();
        loop {
            if guard.shutdown {
                return Err(PoolError::Shutdown);
            }

            if let Some(id) = guard.free_ids.pop() {
                guard.in_use += 1;
                let item = Arc::clone(&guard.slots[&id]);
                return Ok(WorkerHandle {
                    pool: self.clone(),
                    id,
                    item,
                });
            }

            if guard.current_size < self.inner.max_size {
                guard.current_size += 1;
                if guard.current_size > guard.max_reached {
                    guard.max_reached = guard.current_size;
                }
                let id = guard.next_id;
                guard.next_id += 1;
                drop(guard);

                match (self.inner.factory)() {
                    Ok(item) => {
                        let mut guard = self.inner.state.lock();
                        let item = Arc::new(item);
                        guard.slots.insert(id, Arc::clone(&item));
                        guard.in_use += 1;
                        return Ok(WorkerHandle {
                            pool: self.clone(),
                            id,
                            item,
                        });
                    }
                    Err(e) => {
                        let mut guard = self.inner.state.lock();
                        guard.current_size -= 1;
                        self.inner.condvar.notify_all();
                        return Err(PoolError::Factory(e));
                    }
                }
            }

            self.inner.condvar.wait(&mut guard);
        }
    }

    /// Calls [`Cancellable::cancel`] on every live item, whether idle or
    /// currently reserved.
    pub fn cancel_all(&self) {
        let guard = self.inner.state.lock();
        for item in guard.slots.values() {
            item.cancel();
        }
    }

    /// Marks the pool as shut down: every future `reserve` call fails
    /// immediately, and waiters already blocked in `reserve` wake and fail.
    pub fn shutdown(&self) {
        let mut guard = self.inner.state.lock();
        guard.shutdown = true;
        self.inner.condvar.notify_all();
    }

    pub fn current_size(&self) -> usize {
        self.inner.state.lock().current_size
    }

    pub fn in_use(&self) -> usize {
        self.inner.state.lock().in_use
    }

    pub fn max_reached(&self) -> usize {
        self.inner.state.lock().max_reached
    }

    fn release(&self, id: u64) {
        let mut guard = self.inner.state.lock();
        guard.in_use -= 1;
        let shrink = guard.current_size > self.inner.initial_size
            && guard.in_use + self.inner.shrink_step >= guard.current_size;
        if shrink {
            guard.slots.remove(&id);
            guard.current_size -= 1;
        } else {
            guard.free_ids.push(id);
        }
        self.inner.condvar.notify_one();
    }
}

/// A shared, returned-on-drop borrow of a [`WorkerPool`] item.
pub struct WorkerHandle<T: Cancellable + Send + Sync + 'static> {
    pool: WorkerPool<T>,
    id: u64,
    item: Arc<T>,
}

impl<T: Cancellable + Send + Sync + 'static> Deref for WorkerHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Cancellable + Send + Sync + 'static + fmt::Debug> fmt::Debug for WorkerHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle").field("item", &self.item).finish()
    }
}

impl<T: Cancellable + Send + Sync + 'static> Drop for WorkerHandle<T> {
    fn drop(&mut self) {
        self.pool.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Worker {
        cancelled: AtomicBool,
    }

    impl Cancellable for Worker {
        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn reserve_reuses_released_workers() {
        let built = Arc::new(AtomicUsize::new(0));
        let built2 = Arc::clone(&built);
        let pool: WorkerPool<Worker> = WorkerPool::new(1, 3, 1, move || {
            built2.fetch_add(1, Ordering::Relaxed);
            Ok(Worker {
                cancelled: AtomicBool::new(false),
            })
        })
        .unwrap();
        {
            let _h = pool.reserve().unwrap();
        }
        let _h2 = pool.reserve().unwrap();
        assert_eq!(built.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn pool_shrinks_back_toward_initial_size() {
        let pool: WorkerPool<Worker> = WorkerPool::new(1, 4, 1, || {
            Ok(Worker {
                cancelled: AtomicBool::new(false),
            })
        })
        .unwrap();
        let h1 = pool.reserve().unwrap();
        let h2 = pool.reserve().unwrap();
        let h3 = pool.reserve().unwrap();
        assert_eq!(pool.current_size(), 3);
        drop(h1);
        drop(h2);
        drop(h3);
        assert_eq!(pool.current_size(), 1);
    }

    #[test]
    fn cancel_all_reaches_checked_out_items() {
        let pool: WorkerPool<Worker> = WorkerPool::new(1, 2, 1, || {
            Ok(Worker {
                cancelled: AtomicBool::new(false),
            })
        })
        .unwrap();
        let handle = pool.reserve().unwrap();
        pool.cancel_all();
        assert!(handle.cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn shutdown_rejects_future_reservations() {
        let pool: WorkerPool<Worker> = WorkerPool::new(1, 1, 1, || {
            Ok(Worker {
                cancelled: AtomicBool::new(false),
            })
        })
        .unwrap();
        pool.shutdown();
        assert!(matches!(pool.reserve(), Err(PoolError::Shutdown)));
    }
}
