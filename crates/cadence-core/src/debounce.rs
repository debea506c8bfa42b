use std::cell::RefCell;
use std::rc::Rc;

use crate::async_controller::AsyncController;
use crate::id_pool::TimerId;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DebounceOptions {
    /// Run on the first call of a burst.
    pub leading: bool,
    /// Run once the burst has been quiet for the wait time.
    pub trailing: bool,
    /// Longest a pending call may be postponed by newer calls.
    pub max_wait: Option<u64>,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            leading: false,
            trailing: true,
            max_wait: None,
        }
    }
}

struct DebounceState<A, R> {
    last_call: Option<f64>,
    last_execution: f64,
    last_args: Option<A>,
    last_result: Option<R>,
    pending_timer: Option<TimerId>,
}

struct DebounceInner<A, R> {
    controller: AsyncController,
    func: Box<dyn Fn(A) -> R + 'static>,
    wait: f64,
    options: DebounceOptions,
    state: RefCell<DebounceState<A, R>>,
}

/// Debounced wrapper produced by [`AsyncController::debounce`].
pub struct Debounced<A, R> {
    inner: Option<Rc<DebounceInner<A, R>>>,
}

impl<A, R> Clone for Debounced<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, R> Debounced<A, R>
where
    A: Clone + 'static,
    R: Clone + 'static,
{
    pub(crate) fn new(
        controller: AsyncController,
        func: Box<dyn Fn(A) -> R + 'static>,
        wait_ms: u64,
        options: DebounceOptions,
    ) -> Self {
        let created_at = controller.now().unwrap_or(0.0);
        Self {
            inner: Some(Rc::new(DebounceInner {
                controller,
                func,
                wait: wait_ms as f64,
                options,
                state: RefCell::new(DebounceState {
                    last_call: None,
                    last_execution: created_at,
                    last_args: None,
                    last_result: None,
                    pending_timer: None,
                }),
            })),
        }
    }

    pub(crate) fn inert() -> Self {
        Self { inner: None }
    }

    pub fn is_inert(&self) -> bool {
        self.inner.is_none()
    }

    pub fn call(&self, args: A) -> Option<R> {
        let inner = self.inner.as_ref()?;
        inner.state.borrow_mut().last_args = Some(args);
        DebounceInner::invoke(inner, true)
    }

    /// Drops the pending execution without running it.
    pub fn cancel(&self) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        if inner.is_pending() {
            let now = inner.now();
            inner.mark_executed(now);
        }
    }

    /// Runs the pending execution right away.
    pub fn flush(&self) -> Option<R> {
        let inner = self.inner.as_ref()?;
        if inner.is_pending() {
            let now = inner.now();
            inner.execute(now);
        }
        inner.last_result()
    }

    /// Whether a trailing execution is scheduled.
    pub fn pending(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| inner.is_pending())
    }

    pub fn last_result(&self) -> Option<R> {
        self.inner.as_ref().and_then(|inner| inner.last_result())
    }
}

impl<A, R> DebounceInner<A, R>
where
    A: Clone + 'static,
    R: Clone + 'static,
{
    fn invoke(this: &Rc<Self>, user_call: bool) -> Option<R> {
        if this.controller.is_disposed() {
            return this.last_result();
        }
        let Some(now) = this.controller.now() else {
            return this.last_result();
        };
        let internal = !user_call;
        // During a re-check the timer that just fired still counts as pending.
        let timer_pending = internal || this.is_pending();
        if internal {
            let fired = this.state.borrow_mut().pending_timer.take();
            if let Some(fired) = fired {
                this.controller.clear_timeout(fired);
            }
        }

        let (execute, recheck_after) = {
            let mut state = this.state.borrow_mut();
            let mut execute_immediately = false;
            if user_call {
                let since_last_call = state.last_call.map_or(f64::INFINITY, |last| now - last);
                if this.options.leading && since_last_call >= this.wait {
                    execute_immediately = true;
                }
                state.last_call = Some(now);
            }

            let delta = state.last_call.map_or(f64::INFINITY, |last| now - last);
            let mut wait_length = this.wait - delta;
            let since_execution = now - state.last_execution;
            let mut max_wait_expired = false;
            if let Some(max_wait) = this.options.max_wait.map(|max_wait| max_wait as f64) {
                if since_execution >= max_wait && timer_pending {
                    max_wait_expired = true;
                } else {
                    wait_length = wait_length.min(max_wait - since_execution);
                }
            }

            if delta >= this.wait || max_wait_expired || execute_immediately {
                (true, None)
            } else if (state.pending_timer.is_none() || internal) && this.options.trailing {
                (false, Some(wait_length))
            } else {
                (false, None)
            }
        };

        if execute {
            this.execute(now);
        } else if let Some(delay) = recheck_after {
            let weak = Rc::downgrade(this);
            let timer = this.controller.set_timeout(
                move || {
                    if let Some(inner) = weak.upgrade() {
                        DebounceInner::invoke(&inner, false);
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

    fn execute(&self, now: f64) {
        self.mark_executed(now);
        let args = self.state.borrow().last_args.clone();
        if let Some(args) = args {
            let result = (self.func)(args);
            self.state.borrow_mut().last_result = Some(result);
        }
    }

    fn mark_executed(&self, now: f64) {
        let pending = {
            let mut state = self.state.borrow_mut();
            state.last_execution = now;
            state.pending_timer.take()
        };
        if let Some(pending) = pending {
            self.controller.clear_timeout(pending);
        }
    }

    fn is_pending(&self) -> bool {
        self.state.borrow().pending_timer.is_some() && !self.controller.is_disposed()
    }

    fn now(&self) -> f64 {
        self.controller
            .now()
            .unwrap_or_else(|| self.state.borrow().last_execution)
    }

    fn last_result(&self) -> Option<R> {
        self.state.borrow().last_result.clone()
    }
}
