//! Deadline-ordered timer and frame bookkeeping for [`HostContext`]
//! implementations.
//!
//! The queue only stores callbacks. Hosts pop or remove them while borrowed
//! and run or drop them after releasing that borrow: a callback's destructor
//! may own controllers or delays that call back into the same host.
//!
//! [`HostContext`]: crate::platform::HostContext

use std::collections::BTreeMap;
use std::fmt;

use crate::collections::map::HashMap;
use crate::platform::{FrameCallback, HostTimerId};

/// Work queued on a host timer.
pub enum HostTask {
    Once(Box<dyn FnOnce() + 'static>),
    Repeat {
        callback: Box<dyn FnMut() + 'static>,
        interval_ms: u64,
    },
}

/// Timer popped from a [`TimerQueue`] because its deadline passed.
pub struct DueTimer<D> {
    pub id: HostTimerId,
    pub deadline: D,
    pub task: HostTask,
}

/// Timers ordered by deadline then scheduling order, plus pending animation
/// frames. `D` is the host's notion of time.
pub struct TimerQueue<D> {
    next_id: HostTimerId,
    next_seq: u64,
    timers: BTreeMap<(D, u64), (HostTimerId, HostTask)>,
    slots: HashMap<HostTimerId, (D, u64)>,
    frames: Vec<(HostTimerId, FrameCallback)>,
    /// Interval currently running outside the queue, and whether it was cleared.
    running: Option<(HostTimerId, bool)>,
}

impl<D> Default for TimerQueue<D> {
    fn default() -> Self {
        Self {
            next_id: 0,
            next_seq: 0,
            timers: BTreeMap::new(),
            slots: HashMap::default(),
            frames: Vec::new(),
            running: None,
        }
    }
}

impl<D: Ord + Copy> TimerQueue<D> {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> HostTimerId {
        self.next_id += 1;
        self.next_id
    }

    /// Queues `task` under a fresh id.
    pub fn schedule(&mut self, deadline: D, task: HostTask) -> HostTimerId {
        let id = self.allocate_id();
        self.enqueue(id, deadline, task);
        id
    }

    fn enqueue(&mut self, id: HostTimerId, deadline: D, task: HostTask) {
        let slot = (deadline, self.next_seq);
        self.next_seq += 1;
        self.timers.insert(slot, (id, task));
        self.slots.insert(id, slot);
    }

    /// Removes a queued timer and hands its task back. Clearing the interval
    /// that is currently running marks it so it is not re-queued.
    #[must_use = "drop the removed task only after releasing the host borrow"]
    pub fn cancel(&mut self, id: HostTimerId) -> Option<HostTask> {
        if let Some(slot) = self.slots.remove(&id) {
            return self.timers.remove(&slot).map(|(_, task)| task);
        }
        if let Some((running, cancelled)) = self.running.as_mut() {
            if *running == id {
                *cancelled = true;
            }
        }
        None
    }

    /// Sequence number the next scheduled timer will get. Passing it to
    /// [`TimerQueue::pop_due`] holds back timers queued after this point.
    pub fn watermark(&self) -> u64 {
        self.next_seq
    }

    /// Pops the earliest timer due at `limit`, skipping timers queued at or
    /// after `watermark`. A popped interval counts as running until
    /// [`TimerQueue::finish_repeat`].
    pub fn pop_due(&mut self, limit: D, watermark: u64) -> Option<DueTimer<D>> {
        let (&slot, _) = self.timers.first_key_value()?;
        if slot.0 > limit || slot.1 >= watermark {
            return None;
        }
        let (id, task) = self.timers.remove(&slot)?;
        self.slots.remove(&id);
        if matches!(task, HostTask::Repeat { .. }) {
            self.running = Some((id, false));
        }
        Some(DueTimer {
            id,
            deadline: slot.0,
            task,
        })
    }

    /// Re-queues an interval after its callback ran, unless it was cleared
    /// meanwhile. A cleared callback is handed back for the caller to drop.
    #[must_use = "drop the returned callback only after releasing the host borrow"]
    pub fn finish_repeat(
        &mut self,
        id: HostTimerId,
        next: D,
        callback: Box<dyn FnMut() + 'static>,
        interval_ms: u64,
    ) -> Option<Box<dyn FnMut() + 'static>> {
        let cleared = match self.running.take() {
            Some((running, cancelled)) if running == id => cancelled,
            other => {
                self.running = other;
                false
            }
        };
        if cleared {
            return Some(callback);
        }
        self.enqueue(
            id,
            next,
            HostTask::Repeat {
                callback,
                interval_ms,
            },
        );
        None
    }

    pub fn next_deadline(&self) -> Option<D> {
        self.timers.first_key_value().map(|(slot, _)| slot.0)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn push_frame(&mut self, callback: FrameCallback) -> HostTimerId {
        let id = self.allocate_id();
        self.frames.push((id, callback));
        id
    }

    #[must_use = "drop the removed callback only after releasing the host borrow"]
    pub fn cancel_frame(&mut self, id: HostTimerId) -> Option<FrameCallback> {
        let position = self.frames.iter().position(|(frame, _)| *frame == id)?;
        Some(self.frames.remove(position).1)
    }

    /// Takes every pending frame; frames requested while they run wait for
    /// the next call.
    pub fn take_frames(&mut self) -> Vec<(HostTimerId, FrameCallback)> {
        std::mem::take(&mut self.frames)
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn is_idle(&self) -> bool {
        self.timers.is_empty() && self.frames.is_empty()
    }
}

impl<D> fmt::Debug for TimerQueue<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("timers", &self.timers.len())
            .field("frames", &self.frames.len())
            .field("running", &self.running)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/host_queue_tests.rs"]
mod tests;
