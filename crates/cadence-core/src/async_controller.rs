//! Disposable owner of timers, intervals, immediates and animation frames.
//!
//! Every piece of work scheduled through an [`AsyncController`] is tracked in
//! its [`TimerRegistry`], so a single [`AsyncController::dispose`] cancels all
//! of it. A controller is either active or disposed; once disposed every
//! operation becomes a no-op that returns an inert value.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::debounce::{DebounceOptions, Debounced};
use crate::delay::Delay;
use crate::error::{CallbackError, CallbackSource};
use crate::id_pool::{SharedIdPool, TimerId};
use crate::platform::{ContextResolver, FixedContext, FrameCallback, HostContext};
use crate::throttle::{ThrottleOptions, Throttled};
use crate::timer_registry::{TimerKind, TimerRegistry};

/// How long a resolved ambient context is reused before resolving again.
pub const CONTEXT_CACHE_TTL_MS: f64 = 500.0;

/// Delay used for animation frames on hosts without a frame primitive.
pub const ANIMATION_FRAME_FALLBACK_MS: u64 = 16;

/// Receives panics raised by scheduled callbacks.
pub type ErrorHook = Rc<dyn Fn(&CallbackError) + 'static>;

struct CachedContext {
    context: Rc<dyn HostContext>,
    resolved_at: f64,
}

impl CachedContext {
    fn is_fresh(&self) -> bool {
        self.context.now_millis() - self.resolved_at <= CONTEXT_CACHE_TTL_MS
    }
}

struct ActiveController {
    registry: TimerRegistry,
    resolver: Rc<dyn ContextResolver>,
    cached: Option<CachedContext>,
    on_error: Option<ErrorHook>,
}

enum ControllerState {
    Active(ActiveController),
    Disposed,
}

struct ControllerInner {
    state: RefCell<ControllerState>,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let ControllerState::Active(active) =
            mem::replace(self.state.get_mut(), ControllerState::Disposed)
        {
            active.registry.clear_all_timers();
        }
    }
}

#[derive(Clone)]
pub struct AsyncController {
    inner: Rc<ControllerInner>,
}

impl AsyncController {
    pub fn new(resolver: Rc<dyn ContextResolver>) -> Self {
        Self::with_parts(resolver, SharedIdPool::new(), None)
    }

    /// Controller bound to a single, always available context.
    pub fn for_context(context: Rc<dyn HostContext>) -> Self {
        Self::new(Rc::new(FixedContext::new(context)))
    }

    pub fn with_parts(
        resolver: Rc<dyn ContextResolver>,
        id_pool: SharedIdPool,
        on_error: Option<ErrorHook>,
    ) -> Self {
        Self {
            inner: Rc::new(ControllerInner {
                state: RefCell::new(ControllerState::Active(ActiveController {
                    registry: TimerRegistry::new(id_pool),
                    resolver,
                    cached: None,
                    on_error,
                })),
            }),
        }
    }

    /// Installs the hook that receives panics from scheduled callbacks.
    pub fn set_error_hook(&self, hook: impl Fn(&CallbackError) + 'static) {
        if let ControllerState::Active(active) = &mut *self.inner.state.borrow_mut() {
            active.on_error = Some(Rc::new(hook));
        }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(*self.inner.state.borrow(), ControllerState::Disposed)
    }

    /// Cancels everything this controller scheduled. Safe to call repeatedly,
    /// including from inside one of its own callbacks.
    pub fn dispose(&self) {
        let previous = mem::replace(
            &mut *self.inner.state.borrow_mut(),
            ControllerState::Disposed,
        );
        if let ControllerState::Active(active) = previous {
            log::debug!(
                "disposing async controller with {} tracked timers",
                active.registry.len()
            );
            active.registry.clear_all_timers();
        }
    }

    /// Number of timers, intervals and frames currently tracked.
    pub fn active_timers(&self) -> usize {
        self.registry().map_or(0, |registry| registry.len())
    }

    /// Number of tracked timers of the given kind.
    pub fn active_of(&self, kind: TimerKind) -> usize {
        self.registry().map_or(0, |registry| registry.count_of(kind))
    }

    /// Current time of the ambient context, if one is available.
    pub fn now(&self) -> Option<f64> {
        self.ambient_context().map(|(_, context)| context.now_millis())
    }

    pub fn set_timeout(&self, callback: impl FnOnce() + 'static, delay_ms: u64) -> TimerId {
        match self.ambient_context() {
            Some((registry, host)) => self.schedule_once(
                registry,
                host,
                CallbackSource::Timeout,
                Box::new(callback),
                delay_ms,
            ),
            None => TimerId::NONE,
        }
    }

    pub fn clear_timeout(&self, id: TimerId) {
        self.remove(id);
    }

    pub fn set_interval(&self, mut callback: impl FnMut() + 'static, interval_ms: u64) -> TimerId {
        let Some((registry, host)) = self.ambient_context() else {
            return TimerId::NONE;
        };
        let weak = Rc::downgrade(&self.inner);
        let host_id = host.set_interval(
            Box::new(move || {
                run_guarded(&weak, CallbackSource::Interval, || callback());
            }),
            interval_ms,
        );
        let id = registry.acquire();
        let cleanup_host = Rc::downgrade(&host);
        registry.add_timer(
            id,
            TimerKind::Interval,
            Box::new(move || {
                if let Some(host) = cleanup_host.upgrade() {
                    host.clear_interval(host_id);
                }
            }),
        );
        id
    }

    pub fn clear_interval(&self, id: TimerId) {
        self.remove(id);
    }

    /// Runs `callback` as soon as possible on `target`, or on the ambient
    /// context when no target is given.
    pub fn set_immediate(
        &self,
        callback: impl FnOnce() + 'static,
        target: Option<&Rc<dyn HostContext>>,
    ) -> TimerId {
        match self.target_context(target) {
            Some((registry, host)) => self.schedule_once(
                registry,
                host,
                CallbackSource::Immediate,
                Box::new(callback),
                0,
            ),
            None => TimerId::NONE,
        }
    }

    pub fn clear_immediate(&self, id: TimerId) {
        self.remove(id);
    }

    /// Runs `callback` with the frame timestamp before the next repaint.
    ///
    /// Falls back to a [`ANIMATION_FRAME_FALLBACK_MS`] timeout when the host
    /// has no native frame primitive.
    pub fn request_animation_frame(
        &self,
        callback: impl FnOnce(f64) + 'static,
        target: Option<&Rc<dyn HostContext>>,
    ) -> TimerId {
        let Some((registry, host)) = self.target_context(target) else {
            return TimerId::NONE;
        };
        let id = registry.acquire();
        let weak = Rc::downgrade(&self.inner);
        let weak_host = Rc::downgrade(&host);
        let frame: FrameCallback = Box::new(move |timestamp| {
            fire_once(&weak, &weak_host, id);
            run_guarded(&weak, CallbackSource::AnimationFrame, move || {
                callback(timestamp)
            });
        });
        let cleanup_host = Rc::downgrade(&host);
        match host.request_animation_frame(frame) {
            Ok(host_id) => registry.add_timer(
                id,
                TimerKind::AnimationFrame,
                Box::new(move || {
                    if let Some(host) = cleanup_host.upgrade() {
                        host.cancel_animation_frame(host_id);
                    }
                }),
            ),
            Err(frame) => {
                let clock = Rc::downgrade(&host);
                let host_id = host.set_timeout(
                    Box::new(move || {
                        let timestamp = clock.upgrade().map_or(0.0, |host| host.now_millis());
                        frame(timestamp);
                    }),
                    ANIMATION_FRAME_FALLBACK_MS,
                );
                registry.add_timer(
                    id,
                    TimerKind::AnimationFrame,
                    Box::new(move || {
                        if let Some(host) = cleanup_host.upgrade() {
                            host.clear_timeout(host_id);
                        }
                    }),
                );
            }
        }
        id
    }

    pub fn cancel_animation_frame(&self, id: TimerId) {
        self.remove(id);
    }

    /// Rate-limits `func` to at most one execution per `wait_ms`.
    pub fn throttle<A, R>(
        &self,
        func: impl Fn(A) -> R + 'static,
        wait_ms: u64,
        options: ThrottleOptions,
    ) -> Throttled<A, R>
    where
        A: Clone + 'static,
        R: Clone + 'static,
    {
        if self.is_disposed() {
            return Throttled::inert();
        }
        Throttled::new(self.clone(), Box::new(func), wait_ms, options)
    }

    /// Delays `func` until `wait_ms` passed without another call.
    pub fn debounce<A, R>(
        &self,
        func: impl Fn(A) -> R + 'static,
        wait_ms: u64,
        options: DebounceOptions,
    ) -> Debounced<A, R>
    where
        A: Clone + 'static,
        R: Clone + 'static,
    {
        if self.is_disposed() {
            return Debounced::inert();
        }
        Debounced::new(self.clone(), Box::new(func), wait_ms, options)
    }

    /// Future that completes after `delay_ms`.
    pub fn delay(&self, delay_ms: u64) -> Delay {
        Delay::new(self, delay_ms)
    }

    pub(crate) fn registry(&self) -> Option<TimerRegistry> {
        match &*self.inner.state.borrow() {
            ControllerState::Active(active) => Some(active.registry.clone()),
            ControllerState::Disposed => None,
        }
    }

    fn remove(&self, id: TimerId) {
        if !id.is_some() {
            return;
        }
        if let Some(registry) = self.registry() {
            registry.remove_timer(id);
        }
    }

    fn target_context(
        &self,
        target: Option<&Rc<dyn HostContext>>,
    ) -> Option<(TimerRegistry, Rc<dyn HostContext>)> {
        match target {
            Some(target) => self
                .registry()
                .map(|registry| (registry, Rc::clone(target))),
            None => self.ambient_context(),
        }
    }

    fn ambient_context(&self) -> Option<(TimerRegistry, Rc<dyn HostContext>)> {
        let resolver = {
            let state = self.inner.state.borrow();
            let ControllerState::Active(active) = &*state else {
                return None;
            };
            if let Some(cached) = active.cached.as_ref().filter(|cached| cached.is_fresh()) {
                return Some((active.registry.clone(), Rc::clone(&cached.context)));
            }
            Rc::clone(&active.resolver)
        };

        let resolved = resolver.resolve();

        let mut state = self.inner.state.borrow_mut();
        let ControllerState::Active(active) = &mut *state else {
            return None;
        };
        match resolved {
            Some(context) => {
                active.cached = Some(CachedContext {
                    resolved_at: context.now_millis(),
                    context: Rc::clone(&context),
                });
                Some((active.registry.clone(), context))
            }
            None => {
                active.cached = None;
                log::trace!("no execution context available, skipping schedule");
                None
            }
        }
    }

    fn schedule_once(
        &self,
        registry: TimerRegistry,
        host: Rc<dyn HostContext>,
        source: CallbackSource,
        callback: Box<dyn FnOnce() + 'static>,
        delay_ms: u64,
    ) -> TimerId {
        let id = registry.acquire();
        let weak = Rc::downgrade(&self.inner);
        let weak_host = Rc::downgrade(&host);
        let host_id = host.set_timeout(
            Box::new(move || {
                fire_once(&weak, &weak_host, id);
                run_guarded(&weak, source, callback);
            }),
            delay_ms,
        );
        let cleanup_host = Rc::downgrade(&host);
        registry.add_timer(
            id,
            TimerKind::Timeout,
            Box::new(move || {
                if let Some(host) = cleanup_host.upgrade() {
                    host.clear_timeout(host_id);
                }
            }),
        );
        id
    }
}

impl fmt::Debug for AsyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncController")
            .field("disposed", &self.is_disposed())
            .field("active_timers", &self.active_timers())
            .finish()
    }
}

/// Queues the batched removal of a one-shot timer that just fired.
fn fire_once(weak: &Weak<ControllerInner>, weak_host: &Weak<dyn HostContext>, id: TimerId) {
    let (Some(inner), Some(host)) = (weak.upgrade(), weak_host.upgrade()) else {
        return;
    };
    if let Some(registry) = (AsyncController { inner }).registry() {
        registry.schedule_timer_removal(id, &host);
    }
}

/// Runs a user callback, routing a panic to the controller's error hook.
fn run_guarded(weak: &Weak<ControllerInner>, source: CallbackSource, callback: impl FnOnce()) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    if matches!(*inner.state.borrow(), ControllerState::Disposed) {
        return;
    }
    drop(inner);
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
        report(weak, CallbackError::from_panic(source, payload));
    }
}

fn report(weak: &Weak<ControllerInner>, error: CallbackError) {
    let hook = weak.upgrade().and_then(|inner| {
        let hook = match &*inner.state.borrow() {
            ControllerState::Active(active) => active.on_error.clone(),
            ControllerState::Disposed => None,
        };
        hook
    });
    match hook {
        Some(hook) => hook(&error),
        None => log::error!("{error}"),
    }
}

#[cfg(test)]
#[path = "tests/async_controller_tests.rs"]
mod tests;
