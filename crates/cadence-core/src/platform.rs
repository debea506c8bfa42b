//! Platform abstraction traits for Cadence host services.
//!
//! These traits let the controllers delegate scheduling, timekeeping and
//! listener attachment to whatever environment hosts them (a browser-like
//! window, a native event loop, or a virtual test host) without depending
//! directly on any of them.

use std::rc::Rc;

use crate::error::DetachError;
use crate::event_registry::{Event, ListenerOptions};

/// Identifier handed out by a host for one of its own timers or frames.
pub type HostTimerId = u64;

/// Callback invoked with the frame timestamp in milliseconds.
pub type FrameCallback = Box<dyn FnOnce(f64) + 'static>;

/// Listener as seen by an [`EventTarget`].
pub type NativeListener = Rc<dyn Fn(&Event) + 'static>;

/// Provides monotonic timing information.
pub trait Clock {
    /// Milliseconds elapsed since an arbitrary, fixed origin.
    fn now_millis(&self) -> f64;
}

/// An execution context able to run deferred work.
///
/// Implementations run every callback on the thread that owns the context and
/// never invoke a callback synchronously from inside the call that scheduled it.
pub trait HostContext: Clock {
    /// Run `callback` once after `delay_ms`.
    fn set_timeout(&self, callback: Box<dyn FnOnce() + 'static>, delay_ms: u64) -> HostTimerId;

    /// Cancel a pending timeout. Unknown or already fired ids are ignored.
    fn clear_timeout(&self, id: HostTimerId);

    /// Run `callback` every `interval_ms` until cleared.
    fn set_interval(&self, callback: Box<dyn FnMut() + 'static>, interval_ms: u64)
        -> HostTimerId;

    /// Cancel an interval. Unknown ids are ignored.
    fn clear_interval(&self, id: HostTimerId);

    /// Run `callback` before the next repaint.
    ///
    /// Hosts without a native frame primitive hand the callback back through
    /// `Err` so the caller can fall back to a timer.
    fn request_animation_frame(
        &self,
        callback: FrameCallback,
    ) -> Result<HostTimerId, FrameCallback> {
        Err(callback)
    }

    /// Cancel a frame request made through [`HostContext::request_animation_frame`].
    fn cancel_animation_frame(&self, _id: HostTimerId) {}
}

/// Looks up the ambient execution context.
///
/// Resolution may be comparatively expensive; the async controller caches the
/// result for a short time.
pub trait ContextResolver {
    fn resolve(&self) -> Option<Rc<dyn HostContext>>;
}

impl<F> ContextResolver for F
where
    F: Fn() -> Option<Rc<dyn HostContext>>,
{
    fn resolve(&self) -> Option<Rc<dyn HostContext>> {
        self()
    }
}

/// Resolver that always yields the same context.
#[derive(Clone)]
pub struct FixedContext {
    context: Rc<dyn HostContext>,
}

impl FixedContext {
    pub fn new(context: Rc<dyn HostContext>) -> Self {
        Self { context }
    }
}

impl ContextResolver for FixedContext {
    fn resolve(&self) -> Option<Rc<dyn HostContext>> {
        Some(Rc::clone(&self.context))
    }
}

/// Something listeners can be attached to.
pub trait EventTarget {
    fn add_event_listener(
        &self,
        event_name: &str,
        listener: &NativeListener,
        options: ListenerOptions,
    );

    /// Detach a listener previously attached with the same name and options.
    fn remove_event_listener(
        &self,
        event_name: &str,
        listener: &NativeListener,
        options: ListenerOptions,
    ) -> Result<(), DetachError>;
}
