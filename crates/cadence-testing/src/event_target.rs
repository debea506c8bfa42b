use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use cadence_core::platform::{EventTarget, NativeListener};
use cadence_core::{DetachError, Event, ListenerOptions};

struct Attached {
    event_name: String,
    listener: NativeListener,
    options: ListenerOptions,
}

/// In-memory event target.
#[derive(Default)]
pub struct TestEventTarget {
    attached: RefCell<Vec<Attached>>,
    fail_removals: Cell<bool>,
}

impl TestEventTarget {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn as_target(self: &Rc<Self>) -> Rc<dyn EventTarget> {
        Rc::clone(self) as Rc<dyn EventTarget>
    }

    /// Makes every later detach report an error after removing the listener.
    pub fn fail_removals(&self, fail: bool) {
        self.fail_removals.set(fail);
    }

    /// Delivers an event to the listeners attached for `event_name`, in
    /// attachment order. Returns how many listeners ran.
    pub fn dispatch(&self, event_name: &str, payload: Option<Rc<dyn Any>>) -> usize {
        let listeners: Vec<NativeListener> = self
            .attached
            .borrow()
            .iter()
            .filter(|attached| attached.event_name == event_name)
            .map(|attached| Rc::clone(&attached.listener))
            .collect();
        let event = Event::new(event_name, payload);
        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.attached.borrow().len()
    }

    pub fn listeners_for(&self, event_name: &str) -> usize {
        self.attached
            .borrow()
            .iter()
            .filter(|attached| attached.event_name == event_name)
            .count()
    }

    /// Options used by the attached listeners for `event_name`.
    pub fn options_for(&self, event_name: &str) -> Vec<ListenerOptions> {
        self.attached
            .borrow()
            .iter()
            .filter(|attached| attached.event_name == event_name)
            .map(|attached| attached.options)
            .collect()
    }
}

impl EventTarget for TestEventTarget {
    fn add_event_listener(
        &self,
        event_name: &str,
        listener: &NativeListener,
        options: ListenerOptions,
    ) {
        self.attached.borrow_mut().push(Attached {
            event_name: event_name.to_string(),
            listener: Rc::clone(listener),
            options,
        });
    }

    fn remove_event_listener(
        &self,
        event_name: &str,
        listener: &NativeListener,
        options: ListenerOptions,
    ) -> Result<(), DetachError> {
        let mut attached = self.attached.borrow_mut();
        let position = attached.iter().position(|candidate| {
            candidate.event_name == event_name
                && Rc::ptr_eq(&candidate.listener, listener)
                && candidate.options == options
        });
        let Some(position) = position else {
            return Err(DetachError::NotAttached {
                event_name: event_name.to_string(),
            });
        };
        attached.remove(position);
        if self.fail_removals.get() {
            return Err(DetachError::Rejected {
                event_name: event_name.to_string(),
                reason: "removal failure injected by test".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for TestEventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestEventTarget")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
