use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::pool::object_pool::Pool;

/// A scoped, exclusive borrow of a pooled item.
///
/// `Handle` is move-only and owns the item by value for the duration of the
/// borrow; there is no explicit release method; the item reliably returns to
/// the pool's free list when the handle drops, whatever the reason (normal
/// drop, unwind, or early `return`).
pub struct Handle<T> {
    pool: Pool<T>,
    item: Option<T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(pool: Pool<T>, item: T) -> Self {
        Self {
            pool,
            item: Some(item),
        }
    }
}

impl<T> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("handle item taken before drop")
    }
}

impl<T> DerefMut for Handle<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("handle item taken before drop")
    }
}

impl<T: fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("item", &self.item).finish()
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}
