//! Minimal virtual-time host for unit tests inside this crate.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::DetachError;
use crate::event_registry::{Event, ListenerOptions};
use crate::host_queue::{HostTask, TimerQueue};
use crate::platform::{Clock, EventTarget, FrameCallback, HostContext, HostTimerId, NativeListener};

#[derive(Default)]
pub(crate) struct QueueHost {
    now: Cell<u64>,
    queue: RefCell<TimerQueue<u64>>,
    native_frames: bool,
}

impl QueueHost {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn with_frames() -> Rc<Self> {
        Rc::new(Self {
            native_frames: true,
            ..Self::default()
        })
    }

    pub(crate) fn as_context(self: &Rc<Self>) -> Rc<dyn HostContext> {
        Rc::clone(self) as Rc<dyn HostContext>
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.borrow().pending_timers()
    }

    pub(crate) fn pending_frames(&self) -> usize {
        self.queue.borrow().pending_frames()
    }

    /// Advances virtual time, running every timer that comes due in order.
    pub(crate) fn advance(&self, ms: u64) {
        let target = self.now.get() + ms;
        loop {
            let Some(due) = self.queue.borrow_mut().pop_due(target, u64::MAX) else {
                break;
            };
            self.now.set(due.deadline);
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
        self.now.set(target);
    }

    pub(crate) fn run_frames(&self) {
        let frames = self.queue.borrow_mut().take_frames();
        let now = self.now.get() as f64;
        for (_, callback) in frames {
            callback(now);
        }
    }
}

impl Clock for QueueHost {
    fn now_millis(&self) -> f64 {
        self.now.get() as f64
    }
}

impl HostContext for QueueHost {
    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: u64) -> HostTimerId {
        let deadline = self.now.get() + delay_ms;
        self.queue.borrow_mut().schedule(deadline, HostTask::Once(callback))
    }

    fn clear_timeout(&self, id: HostTimerId) {
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

/// Event target that records attached listeners and can dispatch to them.
#[derive(Default)]
pub(crate) struct RecordingTarget {
    listeners: RefCell<Vec<(String, NativeListener, ListenerOptions)>>,
    pub(crate) reject_removals: Cell<bool>,
}

impl RecordingTarget {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn as_target(self: &Rc<Self>) -> Rc<dyn EventTarget> {
        Rc::clone(self) as Rc<dyn EventTarget>
    }

    pub(crate) fn attached(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub(crate) fn dispatch(&self, event_name: &str) {
        let listeners: Vec<NativeListener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _, _)| name == event_name)
            .map(|(_, listener, _)| Rc::clone(listener))
            .collect();
        let event = Event::new(event_name, None);
        for listener in listeners {
            listener(&event);
        }
    }
}

impl EventTarget for RecordingTarget {
    fn add_event_listener(
        &self,
        event_name: &str,
        listener: &NativeListener,
        options: ListenerOptions,
    ) {
        self.listeners
            .borrow_mut()
            .push((event_name.to_string(), Rc::clone(listener), options));
    }

    fn remove_event_listener(
        &self,
        event_name: &str,
        listener: &NativeListener,
        options: ListenerOptions,
    ) -> Result<(), DetachError> {
        let mut listeners = self.listeners.borrow_mut();
        let position = listeners.iter().position(|(name, attached, attached_options)| {
            name == event_name && Rc::ptr_eq(attached, listener) && *attached_options == options
        });
        let Some(position) = position else {
            return Err(DetachError::NotAttached {
                event_name: event_name.to_string(),
            });
        };
        listeners.remove(position);
        if self.reject_removals.get() {
            return Err(DetachError::Rejected {
                event_name: event_name.to_string(),
                reason: "target is shutting down".to_string(),
            });
        }
        Ok(())
    }
}
