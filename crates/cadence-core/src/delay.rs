use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::async_controller::AsyncController;
use crate::id_pool::TimerId;

#[derive(Default)]
struct DelayState {
    elapsed: bool,
    waker: Option<Waker>,
}

/// Future returned by [`AsyncController::delay`].
///
/// The underlying timeout is tracked by the controller, so disposing the
/// controller (or dropping the future) cancels it. A delay created on a
/// disposed controller never completes.
pub struct Delay {
    controller: AsyncController,
    timer: TimerId,
    state: Rc<RefCell<DelayState>>,
}

impl Delay {
    pub(crate) fn new(controller: &AsyncController, delay_ms: u64) -> Self {
        let state = Rc::new(RefCell::new(DelayState::default()));
        let weak = Rc::downgrade(&state);
        let timer = controller.set_timeout(
            move || {
                if let Some(state) = weak.upgrade() {
                    let waker = {
                        let mut state = state.borrow_mut();
                        state.elapsed = true;
                        state.waker.take()
                    };
                    if let Some(waker) = waker {
                        waker.wake();
                    }
                }
            },
            delay_ms,
        );
        Self {
            controller: controller.clone(),
            timer,
            state,
        }
    }

    /// Whether no timer backs this delay.
    pub fn is_inert(&self) -> bool {
        !self.timer.is_some()
    }

    pub fn is_elapsed(&self) -> bool {
        self.state.borrow().elapsed
    }
}

impl Future for Delay {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        if state.elapsed {
            return Poll::Ready(());
        }
        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for Delay {
    fn drop(&mut self) {
        if !self.state.borrow().elapsed {
            self.controller.clear_timeout(self.timer);
        }
    }
}
