//! Standard host services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform abstraction
//! traits defined in `cadence-core`: a wall clock, a single-threaded timer
//! loop with emulated animation frames, and a minimal executor for the
//! controller's [`cadence_core::Delay`] futures.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use cadence_core::host_queue::{HostTask, TimerQueue};
use cadence_core::platform::{Clock, FrameCallback, HostContext, HostTimerId};
use cadence_core::AsyncController;
use futures_task::ArcWake;
use web_time::Instant;

/// Clock measuring milliseconds since its creation.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn instant_at(&self, millis: f64) -> Instant {
        self.origin + Duration::from_secs_f64(millis.max(0.0) / 1000.0)
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_millis(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Tuning knobs for [`StdHost`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StdHostConfig {
    /// Spacing of emulated animation frames.
    pub frame_interval_ms: u64,
    /// When false, animation frame requests are refused and callers fall
    /// back to timers.
    pub animation_frames: bool,
    /// Upper bound of callbacks run by a single [`StdHost::turn`].
    pub max_callbacks_per_turn: usize,
}

impl Default for StdHostConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            animation_frames: true,
            max_callbacks_per_turn: 1024,
        }
    }
}

/// Single-threaded host running timers and emulated animation frames
/// against the wall clock.
///
/// Nothing runs until the owner drives the loop through [`StdHost::turn`],
/// [`StdHost::run_until_idle`] or [`StdHost::run_for`].
pub struct StdHost {
    clock: StdClock,
    config: StdHostConfig,
    queue: RefCell<TimerQueue<Instant>>,
    last_frame: Cell<Option<Instant>>,
}

impl StdHost {
    pub fn new() -> Rc<Self> {
        Self::with_config(StdHostConfig::default())
    }

    pub fn with_config(config: StdHostConfig) -> Rc<Self> {
        Rc::new(Self {
            clock: StdClock::new(),
            config,
            queue: RefCell::new(TimerQueue::new()),
            last_frame: Cell::new(None),
        })
    }

    pub fn config(&self) -> StdHostConfig {
        self.config
    }

    pub fn clock(&self) -> StdClock {
        self.clock
    }

    pub fn context(self: &Rc<Self>) -> Rc<dyn HostContext> {
        Rc::clone(self) as Rc<dyn HostContext>
    }

    /// Controller scheduling on this host.
    pub fn controller(self: &Rc<Self>) -> AsyncController {
        AsyncController::for_context(self.context())
    }

    pub fn has_pending_work(&self) -> bool {
        !self.queue.borrow().is_idle()
    }

    /// Runs the timers due now and, when a frame is due, the pending
    /// animation frames. Returns how many callbacks ran.
    pub fn turn(&self) -> usize {
        let now = Instant::now();
        // Work queued during this turn waits for the next one.
        let watermark = self.queue.borrow().watermark();
        let mut ran = 0;
        while ran < self.config.max_callbacks_per_turn {
            let Some(due) = self.queue.borrow_mut().pop_due(now, watermark) else {
                break;
            };
            ran += 1;
            match due.task {
                HostTask::Once(callback) => callback(),
                HostTask::Repeat {
                    mut callback,
                    interval_ms,
                } => {
                    callback();
                    let next = (due.deadline + Self::interval(interval_ms)).max(Instant::now());
                    let cleared = self
                        .queue
                        .borrow_mut()
                        .finish_repeat(due.id, next, callback, interval_ms);
                    drop(cleared);
                }
            }
        }
        ran + self.run_frames_if_due(now)
    }

    fn interval(interval_ms: u64) -> Duration {
        Duration::from_millis(interval_ms.max(1))
    }

    fn run_frames_if_due(&self, now: Instant) -> usize {
        if self.queue.borrow().pending_frames() == 0 || now < self.next_frame_at() {
            return 0;
        }
        self.last_frame.set(Some(now));
        let frames = self.queue.borrow_mut().take_frames();
        let timestamp = self.clock.now_millis();
        let count = frames.len();
        for (_, callback) in frames {
            callback(timestamp);
        }
        count
    }

    fn next_frame_at(&self) -> Instant {
        self.last_frame.get().map_or(self.clock.instant_at(0.0), |last| {
            last + Duration::from_millis(self.config.frame_interval_ms)
        })
    }

    /// Instant at which the loop next has something to do.
    fn next_wakeup(&self) -> Option<Instant> {
        let queue = self.queue.borrow();
        let timer = queue.next_deadline();
        let frame = (queue.pending_frames() > 0).then(|| self.next_frame_at());
        match (timer, frame) {
            (Some(timer), Some(frame)) => Some(timer.min(frame)),
            (timer, frame) => timer.or(frame),
        }
    }

    fn sleep_until(&self, wakeup: Instant, limit: Option<Instant>) {
        let wakeup = limit.map_or(wakeup, |limit| wakeup.min(limit));
        let wait = wakeup.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }

    /// Drives the loop until no timers or frames remain. Never returns while
    /// an interval is active.
    pub fn run_until_idle(&self) {
        while let Some(wakeup) = self.next_wakeup() {
            self.sleep_until(wakeup, None);
            self.turn();
        }
    }

    /// Drives the loop for `duration`, or until it becomes idle.
    pub fn run_for(&self, duration: Duration) {
        let limit = Instant::now() + duration;
        while let Some(wakeup) = self.next_wakeup() {
            if wakeup > limit {
                break;
            }
            self.sleep_until(wakeup, Some(limit));
            self.turn();
        }
    }

    /// Drives the loop until `future` completes.
    ///
    /// Returns `None` when the loop runs out of work first, which means the
    /// future can never complete (for example a delay on a disposed
    /// controller).
    pub fn block_on<F: Future>(&self, future: F) -> Option<F::Output> {
        let flag = Arc::new(WakeFlag::default());
        let waker = futures_task::waker(Arc::clone(&flag));
        let mut cx = Context::from_waker(&waker);
        let mut future = pin!(future);
        loop {
            flag.woken.store(false, Ordering::SeqCst);
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                return Some(output);
            }
            while !flag.woken.load(Ordering::SeqCst) {
                let Some(wakeup) = self.next_wakeup() else {
                    log::debug!("host went idle before the future completed");
                    return None;
                };
                self.sleep_until(wakeup, None);
                self.turn();
            }
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.queue.borrow().pending_timers()
    }

    pub fn pending_frames(&self) -> usize {
        self.queue.borrow().pending_frames()
    }

    fn deadline_after(&self, delay: Duration) -> Instant {
        Instant::now() + delay
    }
}

#[derive(Default)]
struct WakeFlag {
    woken: AtomicBool,
}

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::SeqCst);
    }
}

impl Clock for StdHost {
    fn now_millis(&self) -> f64 {
        self.clock.now_millis()
    }
}

impl HostContext for StdHost {
    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: u64) -> HostTimerId {
        let deadline = self.deadline_after(Duration::from_millis(delay_ms));
        self.queue.borrow_mut().schedule(deadline, HostTask::Once(callback))
    }

    fn clear_timeout(&self, id: HostTimerId) {
        // Dropped unborrowed: the callback may own handles that clear timers here.
        let removed = self.queue.borrow_mut().cancel(id);
        drop(removed);
    }

    fn set_interval(&self, callback: Box<dyn FnMut()>, interval_ms: u64) -> HostTimerId {
        let deadline = self.deadline_after(Self::interval(interval_ms));
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
        if !self.config.animation_frames {
            return Err(callback);
        }
        Ok(self.queue.borrow_mut().push_frame(callback))
    }

    fn cancel_animation_frame(&self, id: HostTimerId) {
        let removed = self.queue.borrow_mut().cancel_frame(id);
        drop(removed);
    }
}

impl fmt::Debug for StdHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdHost")
            .field("config", &self.config)
            .field("pending_timers", &self.pending_timers())
            .field("pending_frames", &self.pending_frames())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/std_host_tests.rs"]
mod tests;
