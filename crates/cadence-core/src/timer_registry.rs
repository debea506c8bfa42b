//! Bookkeeping for every piece of deferred work owned by a controller.
//!
//! Each tracked timer maps a [`TimerId`] to the cleanup that cancels it on the
//! host. Fired one-shot timers are not removed immediately: they join a pending
//! set that a single zero-delay host timer flushes, so a burst of timers
//! completing in the same tick costs one extra host timer instead of one
//! bookkeeping pass each.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::collections::map::{HashMap, HashSet};
use crate::id_pool::{SharedIdPool, TimerId};
use crate::platform::{HostContext, HostTimerId};

/// Host mechanism backing a tracked timer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Timeout,
    Interval,
    AnimationFrame,
}

/// Cancels the host side of a tracked timer.
pub type TimerCleanup = Box<dyn FnOnce() + 'static>;

struct TimerEntry {
    kind: TimerKind,
    cleanup: TimerCleanup,
}

struct ScheduledFlush {
    host: Rc<dyn HostContext>,
    id: HostTimerId,
}

#[derive(Default)]
struct RegistryState {
    timers: HashMap<TimerId, TimerEntry>,
    pending_removal: HashSet<TimerId>,
    flush: Option<ScheduledFlush>,
}

struct RegistryInner {
    pool: SharedIdPool,
    state: RefCell<RegistryState>,
}

#[derive(Clone)]
pub struct TimerRegistry {
    inner: Rc<RegistryInner>,
}

impl TimerRegistry {
    pub fn new(pool: SharedIdPool) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                pool,
                state: RefCell::new(RegistryState::default()),
            }),
        }
    }

    pub fn acquire(&self) -> TimerId {
        self.inner.pool.acquire()
    }

    pub fn release(&self, id: TimerId) {
        self.inner.pool.release(id);
    }

    /// Starts tracking `id`; `cleanup` runs when the timer is removed.
    pub fn add_timer(&self, id: TimerId, kind: TimerKind, cleanup: TimerCleanup) {
        let previous = self
            .inner
            .state
            .borrow_mut()
            .timers
            .insert(id, TimerEntry { kind, cleanup });
        debug_assert!(previous.is_none(), "timer {id} tracked twice");
    }

    /// Runs the cleanup of `id` and recycles the id.
    ///
    /// Returns `false` when `id` is not tracked (already removed or never added).
    pub fn remove_timer(&self, id: TimerId) -> bool {
        let entry = {
            let mut state = self.inner.state.borrow_mut();
            state.pending_removal.remove(&id);
            state.timers.remove(&id)
        };
        match entry {
            Some(entry) => {
                (entry.cleanup)();
                self.inner.pool.release(id);
                true
            }
            None => false,
        }
    }

    /// Queues `id` for removal by the next batched flush on `host`.
    pub fn schedule_timer_removal(&self, id: TimerId, host: &Rc<dyn HostContext>) {
        {
            let mut state = self.inner.state.borrow_mut();
            if !state.timers.contains_key(&id) {
                return;
            }
            state.pending_removal.insert(id);
            if state.flush.is_some() {
                return;
            }
        }
        let weak = Rc::downgrade(&self.inner);
        let flush_id = host.set_timeout(
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    TimerRegistry { inner }.flush_pending();
                }
            }),
            0,
        );
        self.inner.state.borrow_mut().flush = Some(ScheduledFlush {
            host: Rc::clone(host),
            id: flush_id,
        });
    }

    fn flush_pending(&self) {
        let pending: Vec<TimerId> = {
            let mut state = self.inner.state.borrow_mut();
            state.flush = None;
            state.pending_removal.drain().collect()
        };
        log::trace!("flushing {} fired timers", pending.len());
        for id in pending {
            self.remove_timer(id);
        }
    }

    /// Cancels the pending flush and every tracked timer.
    pub fn clear_all_timers(&self) {
        let (flush, timers) = {
            let mut state = self.inner.state.borrow_mut();
            state.pending_removal.clear();
            let timers: Vec<(TimerId, TimerEntry)> = state.timers.drain().collect();
            (state.flush.take(), timers)
        };
        if let Some(flush) = flush {
            flush.host.clear_timeout(flush.id);
        }
        for (id, entry) in timers {
            (entry.cleanup)();
            self.inner.pool.release(id);
        }
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.inner.state.borrow().timers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tracked timers backed by `kind`.
    pub fn count_of(&self, kind: TimerKind) -> usize {
        self.inner
            .state
            .borrow()
            .timers
            .values()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    pub fn pending_removals(&self) -> usize {
        self.inner.state.borrow().pending_removal.len()
    }

    pub fn has_scheduled_flush(&self) -> bool {
        self.inner.state.borrow().flush.is_some()
    }
}

impl fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("TimerRegistry")
            .field("timers", &state.timers.len())
            .field("pending_removal", &state.pending_removal.len())
            .field("flush_scheduled", &state.flush.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/timer_registry_tests.rs"]
mod tests;
