use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use cadence_core::host_queue::{HostTask, TimerQueue};
use cadence_core::platform::{
    Clock, ContextResolver, FixedContext, FrameCallback, HostContext, HostTimerId,
};
use cadence_core::AsyncController;

/// Virtual-time host. Nothing runs until the test advances the clock or
/// drains animation frames, and callbacks never run while the host is
/// borrowed, so they may schedule or cancel freely.
pub struct TestHost {
    now: Cell<u64>,
    native_frames: bool,
    queue: RefCell<TimerQueue<u64>>,
}

impl TestHost {
    /// Host with a native animation-frame primitive.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::build(true))
    }

    /// Host that refuses animation frames, forcing the timer fallback.
    pub fn without_animation_frames() -> Rc<Self> {
        Rc::new(Self::build(false))
    }

    fn build(native_frames: bool) -> Self {
        Self {
            now: Cell::new(0),
            native_frames,
            queue: RefCell::new(TimerQueue::new()),
        }
    }

    pub fn context(self: &Rc<Self>) -> Rc<dyn HostContext> {
        Rc::clone(self) as Rc<dyn HostContext>
    }

    pub fn resolver(self: &Rc<Self>) -> Rc<dyn ContextResolver> {
        Rc::new(FixedContext::new(self.context()))
    }

    /// Controller scheduling on this host.
    pub fn controller(self: &Rc<Self>) -> AsyncController {
        AsyncController::for_context(self.context())
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    pub fn advance_by(&self, ms: u64) {
        self.advance_to(self.now.get() + ms);
    }

    /// Moves the clock to `target`, running every timer that comes due on the
    /// way in deadline order. Timers scheduled by callbacks for a deadline
    /// within the window run too.
    pub fn advance_to(&self, target: u64) {
        let mut fired = 0_usize;
        loop {
            let Some(due) = self.queue.borrow_mut().pop_due(target, u64::MAX) else {
                break;
            };
            self.now.set(due.deadline.max(self.now.get()));
            fired += 1;
            match due.task {
                HostTask::Once(callback) => callback(),
                HostTask::Repeat {
                    mut callback,
                    interval_ms,
                } => {
                    callback();
                    let next = due.deadline + interval_ms.max(1);
                    let cleared = self
                        .queue
                        .borrow_mut()
                        .finish_repeat(due.id, next, callback, interval_ms);
                    drop(cleared);
                }
            }
        }
        self.now.set(target.max(self.now.get()));
        log::trace!("virtual clock at {}ms after {fired} timers", self.now.get());
    }

    /// Runs every timer due at the current time, including zero-delay timers
    /// they schedule.
    pub fn run_due(&self) {
        self.advance_to(self.now.get());
    }

    /// Runs the animation frames requested so far with the current time.
    /// Frames requested from inside a frame wait for the next call.
    pub fn run_animation_frames(&self) -> usize {
        let frames = self.queue.borrow_mut().take_frames();
        let timestamp = self.now.get() as f64;
        let count = frames.len();
        for (_, callback) in frames {
            callback(timestamp);
        }
        count
    }

    /// Deadline of the earliest queued timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.borrow().next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.queue.borrow().pending_timers()
    }

    pub fn pending_frames(&self) -> usize {
        self.queue.borrow().pending_frames()
    }
}

impl Clock for TestHost {
    fn now_millis(&self) -> f64 {
        self.now.get() as f64
    }
}

impl HostContext for TestHost {
    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: u64) -> HostTimerId {
        let deadline = self.now.get() + delay_ms;
        self.queue.borrow_mut().schedule(deadline, HostTask::Once(callback))
    }

    fn clear_timeout(&self, id: HostTimerId) {
        // Dropped unborrowed: the callback may own handles that clear timers here.
        let removed = self.queue.borrow_mut().cancel(id);
        drop(removed);
    }

    fn set_interval(&self, callback: Box<dyn FnMut()>, interval_ms: u64) -> HostTimerId {
        let deadline = self.now.get() + interval_ms.max(1);
        self.queue.borrow_mut().schedule(
            deadline,
            HostTask::Repeat {
                callback,
                interval_ms,
            },
        )
    }

    fn clear_interval(&self, id: HostTimerId) {
        self.clear_timeout(id);
    }

    fn request_animation_frame(
        &self,
        callback: FrameCallback,
    ) -> Result<HostTimerId, FrameCallback> {
        if !self.native_frames {
            return Err(callback);
        }
        Ok(self.queue.borrow_mut().push_frame(callback))
    }

    fn cancel_animation_frame(&self, id: HostTimerId) {
        let removed = self.queue.borrow_mut().cancel_frame(id);
        drop(removed);
    }
}

impl fmt::Debug for TestHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestHost")
            .field("now", &self.now.get())
            .field("pending_timers", &self.pending_timers())
            .field("pending_frames", &self.pending_frames())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
