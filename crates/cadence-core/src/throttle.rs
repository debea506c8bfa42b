use std::cell::RefCell;
use std::rc::Rc;

use crate::async_controller::AsyncController;
use crate::id_pool::TimerId;

/// Which edges of the waiting window run the throttled function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ThrottleOptions {
    pub leading: bool,
    pub trailing: bool,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            leading: true,
            trailing: true,
        }
    }
}

struct ThrottleState<A, R> {
    last_execution: Option<f64>,
    last_args: Option<A>,
    last_result: Option<R>,
    pending_timer: Option<TimerId>,
}

struct ThrottleInner<A, R> {
    controller: AsyncController,
    func: Box<dyn Fn(A) -> R + 'static>,
    wait: f64,
    options: ThrottleOptions,
    state: RefCell<ThrottleState<A, R>>,
}

/// Throttled wrapper produced by [`AsyncController::throttle`].
///
/// Every call returns the result of the most recent execution, which may be
/// from an earlier call.
pub struct Throttled<A, R> {
    inner: Option<Rc<ThrottleInner<A, R>>>,
}

impl<A, R> Clone for Throttled<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, R> Throttled<A, R>
where
    A: Clone + 'static,
    R: Clone + 'static,
{
    pub(crate) fn new(
        controller: AsyncController,
        func: Box<dyn Fn(A) -> R + 'static>,
        wait_ms: u64,
        options: ThrottleOptions,
    ) -> Self {
        Self {
            inner: Some(Rc::new(ThrottleInner {
                controller,
                func,
                wait: wait_ms as f64,
                options,
                state: RefCell::new(ThrottleState {
                    last_execution: None,
                    last_args: None,
                    last_result: None,
                    pending_timer: None,
                }),
            })),
        }
    }

    /// Wrapper that never runs anything.
    pub(crate) fn inert() -> Self {
        Self { inner: None }
    }

    pub fn is_inert(&self) -> bool {
        self.inner.is_none()
    }

    pub fn call(&self, args: A) -> Option<R> {
        let inner = self.inner.as_ref()?;
        inner.state.borrow_mut().last_args = Some(args);
        ThrottleInner::invoke(inner, true)
    }

    pub fn last_result(&self) -> Option<R> {
        let inner = self.inner.as_ref()?;
        let result = inner.state.borrow().last_result.clone();
        result
    }

    /// Whether a trailing execution is scheduled.
    pub fn pending(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| {
            inner.state.borrow().pending_timer.is_some() && !inner.controller.is_disposed()
        })
    }
}

impl<A, R> ThrottleInner<A, R>
where
    A: Clone + 'static,
    R: Clone + 'static,
{
    fn invoke(this: &Rc<Self>, user_call: bool) -> Option<R> {
        if !user_call {
            // The trailing timer fired; it is no longer pending.
            let fired = this.state.borrow_mut().pending_timer.take();
            if let Some(fired) = fired {
                this.controller.clear_timeout(fired);
            }
        }
        let Some(now) = this.controller.now() else {
            return this.last_result();
        };

        let (execute, trailing_delay) = {
            let state = this.state.borrow();
            let elapsed = state
                .last_execution
                .map_or(f64::INFINITY, |last| now - last);
            if elapsed >= this.wait && (!user_call || this.options.leading) {
                (true, None)
            } else if state.pending_timer.is_none() && this.options.trailing {
                let delay = if this.options.leading {
                    this.wait - elapsed
                } else {
                    this.wait
                };
                (false, Some(delay))
            } else {
                (false, None)
            }
        };

        if execute {
            let (pending, args) = {
                let mut state = this.state.borrow_mut();
                state.last_execution = Some(now);
                (state.pending_timer.take(), state.last_args.clone())
            };
            if let Some(pending) = pending {
                this.controller.clear_timeout(pending);
            }
            if let Some(args) = args {
                let result = (this.func)(args);
                this.state.borrow_mut().last_result = Some(result);
            }
        } else if let Some(delay) = trailing_delay {
            let weak = Rc::downgrade(this);
            let timer = this.controller.set_timeout(
                move || {
                    if let Some(inner) = weak.upgrade() {
                        ThrottleInner::invoke(&inner, false);
                    }
                },
                delay.max(0.0).ceil() as u64,
            );
            if timer.is_some() {
                this.state.borrow_mut().pending_timer = Some(timer);
            }
        }

        this.last_result()
    }

    fn last_result(&self) -> Option<R> {
        self.state.borrow().last_result.clone()
    }
}
