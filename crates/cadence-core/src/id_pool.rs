//! Recyclable tracking ids for scheduled work.
//!
//! Released ids are kept on a bounded free list and handed out again before
//! the monotonic counter advances, which keeps ids small for long-lived
//! controllers that schedule many short timers.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Maximum number of released ids kept for reuse.
pub const ID_POOL_CAPACITY: usize = 100;

/// Handle returned by every scheduling call of the async controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TimerId(u64);

impl TimerId {
    /// Inert handle returned when nothing was scheduled.
    pub const NONE: TimerId = TimerId(0);

    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether this handle refers to scheduled work (non-zero).
    pub fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Free-list of released ids plus a monotonic fallback counter.
#[derive(Debug)]
pub struct IdPool {
    free: Vec<TimerId>,
    next: u64,
    capacity: usize,
}

impl IdPool {
    pub fn new() -> Self {
        Self::with_capacity(ID_POOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity.min(16)),
            next: 1,
            capacity,
        }
    }

    /// Returns an id that is not currently outstanding.
    pub fn acquire(&mut self) -> TimerId {
        if let Some(id) = self.free.pop() {
            return id;
        }
        let id = TimerId(self.next);
        self.next += 1;
        id
    }

    /// Returns `id` to the pool. Dropped once the pool is full.
    pub fn release(&mut self, id: TimerId) {
        if !id.is_some() || self.free.len() >= self.capacity {
            return;
        }
        debug_assert!(!self.free.contains(&id), "timer id {id} released twice");
        self.free.push(id);
    }

    /// Number of ids waiting to be reused.
    pub fn pooled(&self) -> usize {
        self.free.len()
    }
}

impl Default for IdPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheaply clonable handle to an [`IdPool`] shared between controllers.
#[derive(Clone, Default)]
pub struct SharedIdPool {
    inner: Rc<RefCell<IdPool>>,
}

impl SharedIdPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pool(pool: IdPool) -> Self {
        Self {
            inner: Rc::new(RefCell::new(pool)),
        }
    }

    pub fn acquire(&self) -> TimerId {
        self.inner.borrow_mut().acquire()
    }

    pub fn release(&self, id: TimerId) {
        self.inner.borrow_mut().release(id);
    }

    pub fn pooled(&self) -> usize {
        self.inner.borrow().pooled()
    }
}

impl fmt::Debug for SharedIdPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedIdPool")
            .field("pooled", &self.pooled())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/id_pool_tests.rs"]
mod tests;
