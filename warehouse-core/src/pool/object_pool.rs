use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, PoolError};
use crate::pool::handle::Handle;
use crate::task::TaskGroup;

/// How a [`Pool`]'s initial `start_size` items are built at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolInit {
    /// Items are built one at a time on the calling thread.
    Sequential,
    /// Items are built concurrently via a [`TaskGroup`].
    Parallel,
}

struct State<T> {
    free: Vec<T>,
    current_size: usize,
    in_use: usize,
}

struct Inner<T> {
    start_size: usize,
    max_size: usize,
    factory: Arc<dyn Fn() -> Result<T, Error> + Send + Sync>,
    state: Mutex<State<T>>,
    condvar: Condvar,
}

/// A bounded pool of interchangeable, exclusively-borrowed items.
///
/// Items are handed out by value wrapped in a [`Handle`]; the handle's `Drop`
/// returns the item to the pool's free list. `Pool` is a thin, cheaply
/// cloneable reference to shared state: cloning a `Pool` shares the same
/// backing storage rather than creating a second pool, which is also what
/// makes a checked-out item's lifetime independent of any one `Pool` handle
/// going out of scope — the pool's storage is only freed once every `Pool`
/// and `Handle` referencing it has dropped.
pub struct Pool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Pool<T> {
    pub fn start_size(&self) -> usize {
        self.inner.start_size
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    pub fn current_size(&self) -> usize {
        self.inner.state.lock().current_size
    }

    pub fn in_use(&self) -> usize {
        self.inner.state.lock().in_use
    }

    pub(crate) fn release(&self, item: T) {
        let mut guard = self.inner.state.lock();
        guard.free.push(item);
        guard.in_use -= 1;
        self.inner.condvar.notify_one();
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Builds a pool with `start_size` pre-built items (clamped to at least 2)
    /// and a ceiling of `max_size` (clamped to at least `start_size`).
    pub fn new<F>(
        start_size: usize,
        max_size: usize,
        init: PoolInit,
        factory: F,
    ) -> Result<Self, PoolError>
    where
        F: Fn() -> Result<T, Error> + Send + Sync + 'static,
    {
        let start_size = start_size.max(2);
        let max_size = max_size.max(start_size);
        let factory: Arc<dyn Fn() -> Result<T, Error> + Send + Sync> = Arc::new(factory);

        let initial_items = match init {
            PoolInit::Sequential => {
                let mut items = Vec::with_capacity(start_size);
                for _ in 0..start_size {
                    items.push(factory().map_err(PoolError::Factory)?);
                }
                items
            }
            PoolInit::Parallel => build_parallel(start_size, Arc::clone(&factory))?,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                start_size,
                max_size,
                factory,
                state: Mutex::new(State {
                    free: initial_items,
                    current_size: start_size,
                    in_use: 0,
                }),
                condvar: Condvar::new(),
            }),
        })
    }

    /// Blocks until an item is available, growing the pool if below
    /// `max_size` before waiting on a release.
    pub fn get(&self) -> Result<Handle<T>, PoolError> {
        self.acquire(None)
    }

    /// Like [`Pool::get`], but returns [`PoolError::Timeout`] if no item
    /// becomes available within `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<Handle<T>, PoolError> {
        self.acquire(Some(timeout))
    }

    fn acquire(&self, timeout: Option<Duration>) -> Result<Handle<T>, PoolError> {
        let deadline = timeout.map(|d| std::time::Instant::now() + d);
        let mut guard = self.inner.state.lock();
        loop {
            if let Some(item) = guard.free.pop() {
                guard.in_use += 1;
                return Ok(Handle::new(self.clone(), item));
            }

            if guard.current_size < self.inner.max_size {
                guard.current_size += 1;
                drop(guard);
                match (self.inner.factory)() {
                    Ok(item) => {
                        let mut guard = self.inner.state.lock();
                        guard.in_use += 1;
                        return Ok(Handle::new(self.clone(), item));
                    }
                    Err(e) => {
                        let mut guard = self.inner.state.lock();
                        guard.current_size -= 1;
                        self.inner.condvar.notify_one();
                        return Err(PoolError::Factory(e));
                    }
                }
            }

            match deadline {
                None => self.inner.condvar.wait(&mut guard),
                Some(deadline) => {
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        return Err(PoolError::Timeout);
                    }
                    let timed_out = self
                        .inner
                        .condvar
                        .wait_for(&mut guard, deadline - now)
                        .timed_out();
                    if timed_out && guard.free.is_empty() && guard.current_size >= self.inner.max_size {
                        return Err(PoolError::Timeout);
                    }
                }
            }
        }
    }
}

/// Builds the initial `start_size` items concurrently via a [`TaskGroup`]
/// sized to run every item's task at once, aggregating factory errors and
/// failing the whole build on the first one observed.
fn build_parallel<T>(
    start_size: usize,
    factory: Arc<dyn Fn() -> Result<T, Error> + Send + Sync>,
) -> Result<Vec<T>, PoolError>
where
    T: Send + 'static,
{
    let results: Arc<Mutex<Vec<T>>> = Arc::new(Mutex::new(Vec::with_capacity(start_size)));
    let first_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));

    let group = TaskGroup::new(start_size);
    for i in 0..start_size {
        let factory = Arc::clone(&factory);
        let results = Arc::clone(&results);
        let first_error = Arc::clone(&first_error);
        group.add(format!("pool-warmup-{i}"), move |_token| {
            match factory() {
                Ok(item) => results.lock().push(item),
                Err(e) => {
                    let mut slot = first_error.lock();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                }
            }
            Ok(())
        });
    }
    let _ = group.wait();

    match Arc::try_unwrap(first_error).unwrap().into_inner() {
        Some(e) => Err(PoolError::Factory(e)),
        None => Ok(Arc::try_unwrap(results).unwrap().into_inner()),
    }
}
