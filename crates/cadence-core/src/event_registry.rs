//! Bulk-manageable event listener registrations.
//!
//! An [`EventListenerRegistry`] remembers every listener it attached so a
//! component can detach them by target, by event, by callback, or all at
//! once. Registrations are never deduplicated: attaching the same callback
//! twice yields two records that are removed independently.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::collections::map::HashMap;
use crate::error::{CallbackError, CallbackSource};
use crate::platform::{EventTarget, NativeListener};

/// Callback stored in the registry; receives the registry owner and the event.
pub type EventCallback<O> = Rc<dyn Fn(&O, &Event) + 'static>;

/// Wraps a closure as an [`EventCallback`], keeping a handle usable with
/// [`EventListenerRegistry::off`].
pub fn listener<O>(callback: impl Fn(&O, &Event) + 'static) -> EventCallback<O> {
    Rc::new(callback)
}

/// An event delivered to listeners, either by a target or through
/// [`EventListenerRegistry::raise`].
#[derive(Clone)]
pub struct Event {
    name: Rc<str>,
    payload: Option<Rc<dyn Any>>,
}

impl Event {
    pub fn new(name: &str, payload: Option<Rc<dyn Any>>) -> Self {
        Self {
            name: Rc::from(name),
            payload,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Option<&Rc<dyn Any>> {
        self.payload.as_ref()
    }

    /// Payload downcast to `T`, if present and of that type.
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ListenerOptions {
    pub capture: bool,
    pub passive: bool,
}

/// Registry-local identity of an event target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

/// Lazily assigned target ids, associated weakly with their targets.
struct TargetIds {
    by_address: HashMap<usize, (Weak<dyn EventTarget>, TargetId)>,
    next: u64,
    prune_at: usize,
}

impl TargetIds {
    fn new() -> Self {
        Self {
            by_address: HashMap::default(),
            next: 1,
            prune_at: 16,
        }
    }

    fn get(&self, target: &Rc<dyn EventTarget>) -> Option<TargetId> {
        let (weak, id) = self.by_address.get(&address_of(target))?;
        let alive = weak
            .upgrade()
            .is_some_and(|existing| address_of(&existing) == address_of(target));
        alive.then_some(*id)
    }

    fn get_or_assign(&mut self, target: &Rc<dyn EventTarget>) -> TargetId {
        if let Some(id) = self.get(target) {
            return id;
        }
        if self.by_address.len() >= self.prune_at {
            self.by_address.retain(|_, (weak, _)| weak.strong_count() > 0);
            self.prune_at = (self.by_address.len() * 2).max(16);
        }
        let id = TargetId(self.next);
        self.next += 1;
        self.by_address.insert(address_of(target), (Rc::downgrade(target), id));
        id
    }
}

fn address_of<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

struct EventRecord<O> {
    seq: u64,
    target: Rc<dyn EventTarget>,
    event_name: Rc<str>,
    native: NativeListener,
    options: ListenerOptions,
    original: EventCallback<O>,
}

impl<O> EventRecord<O> {
    fn matches(
        &self,
        callback: Option<&EventCallback<O>>,
        options: Option<ListenerOptions>,
    ) -> bool {
        let callback_matches = callback.map_or(true, |callback| {
            Rc::ptr_eq(&self.original, callback) || address_of(&self.native) == address_of(callback)
        });
        callback_matches && options.map_or(true, |options| options == self.options)
    }

    fn detach(self) {
        if let Err(err) = self
            .target
            .remove_event_listener(&self.event_name, &self.native, self.options)
        {
            log::debug!("ignoring listener detach failure: {err}");
        }
    }
}

type RecordList<O> = SmallVec<[EventRecord<O>; 2]>;
type RecordsByName<O> = HashMap<Rc<str>, RecordList<O>>;

struct ActiveRegistry<O> {
    owner: Rc<O>,
    target_ids: TargetIds,
    records: HashMap<TargetId, RecordsByName<O>>,
    next_seq: u64,
}

impl<O> ActiveRegistry<O> {
    fn take_all(&mut self) -> Vec<EventRecord<O>> {
        self.records
            .drain()
            .flat_map(|(_, by_name)| by_name.into_iter().flat_map(|(_, list)| list))
            .collect()
    }
}

enum RegistryState<O> {
    Active(ActiveRegistry<O>),
    Disposed,
}

/// Tracks listeners attached to event targets on behalf of one owner.
///
/// Callbacks receive the owner supplied at construction as their first
/// argument. The owner reference is released on [`EventListenerRegistry::dispose`].
pub struct EventListenerRegistry<O: 'static = ()> {
    state: RefCell<RegistryState<O>>,
}

impl EventListenerRegistry<()> {
    pub fn new() -> Self {
        Self::with_owner(Rc::new(()))
    }
}

impl Default for EventListenerRegistry<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: 'static> EventListenerRegistry<O> {
    pub fn with_owner(owner: Rc<O>) -> Self {
        Self {
            state: RefCell::new(RegistryState::Active(ActiveRegistry {
                owner,
                target_ids: TargetIds::new(),
                records: HashMap::default(),
                next_seq: 0,
            })),
        }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(*self.state.borrow(), RegistryState::Disposed)
    }

    /// Attaches `callback` to `target` for `event_name`.
    ///
    /// Registrations without an event name and registrations on a disposed
    /// registry are ignored.
    pub fn on(
        &self,
        target: &Rc<dyn EventTarget>,
        event_name: &str,
        callback: &EventCallback<O>,
        options: ListenerOptions,
    ) -> &Self {
        if event_name.trim().is_empty() {
            if cfg!(debug_assertions) {
                log::warn!("ignoring listener registration without an event name");
            }
            return self;
        }

        let native = {
            let mut state = self.state.borrow_mut();
            let RegistryState::Active(active) = &mut *state else {
                return self;
            };
            let owner = Rc::clone(&active.owner);
            let original = Rc::clone(callback);
            let native: NativeListener = Rc::new(move |event: &Event| {
                let result = panic::catch_unwind(AssertUnwindSafe(|| original(&owner, event)));
                if let Err(payload) = result {
                    log::error!(
                        "{}",
                        CallbackError::from_panic(CallbackSource::Listener, payload)
                    );
                }
            });

            let target_id = active.target_ids.get_or_assign(target);
            let seq = active.next_seq;
            active.next_seq += 1;
            let event_name: Rc<str> = Rc::from(event_name);
            active
                .records
                .entry(target_id)
                .or_default()
                .entry(Rc::clone(&event_name))
                .or_default()
                .push(EventRecord {
                    seq,
                    target: Rc::clone(target),
                    event_name,
                    native: Rc::clone(&native),
                    options,
                    original: Rc::clone(callback),
                });
            native
        };

        target.add_event_listener(event_name, &native, options);
        self
    }

    /// Attaches several `(event name, callback)` pairs to one target.
    pub fn on_all(
        &self,
        target: &Rc<dyn EventTarget>,
        listeners: &[(&str, EventCallback<O>)],
        options: ListenerOptions,
    ) -> &Self {
        for (event_name, callback) in listeners {
            self.on(target, event_name, callback, options);
        }
        self
    }

    /// Detaches listeners.
    ///
    /// * no target: disposes the registry;
    /// * target only: every listener on that target;
    /// * target and event name: listeners for that event, further narrowed by
    ///   `callback` and `options` when given.
    pub fn off(
        &self,
        target: Option<&Rc<dyn EventTarget>>,
        event_name: Option<&str>,
        callback: Option<&EventCallback<O>>,
        options: Option<ListenerOptions>,
    ) -> &Self {
        let Some(target) = target else {
            self.dispose();
            return self;
        };

        let removed = {
            let mut state = self.state.borrow_mut();
            let RegistryState::Active(active) = &mut *state else {
                return self;
            };
            let Some(target_id) = active.target_ids.get(target) else {
                return self;
            };
            match event_name {
                None => active
                    .records
                    .remove(&target_id)
                    .map(|by_name| by_name.into_values().flatten().collect())
                    .unwrap_or_default(),
                Some(event_name) => {
                    Self::remove_matching(active, target_id, event_name, callback, options)
                }
            }
        };

        for record in removed {
            record.detach();
        }
        self
    }

    /// Detaches every listener attached to `target`.
    pub fn off_target(&self, target: &Rc<dyn EventTarget>) -> &Self {
        self.off(Some(target), None, None, None)
    }

    fn remove_matching(
        active: &mut ActiveRegistry<O>,
        target_id: TargetId,
        event_name: &str,
        callback: Option<&EventCallback<O>>,
        options: Option<ListenerOptions>,
    ) -> Vec<EventRecord<O>> {
        let Some(by_name) = active.records.get_mut(&target_id) else {
            return Vec::new();
        };
        let Some(list) = by_name.get_mut(event_name) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<EventRecord<O>>, Vec<EventRecord<O>>) = mem::take(list)
            .into_iter()
            .partition(|record| record.matches(callback, options));
        *list = kept.into_iter().collect();
        if list.is_empty() {
            by_name.remove(event_name);
        }
        if by_name.is_empty() {
            active.records.remove(&target_id);
        }
        removed
    }

    /// Synchronously invokes every listener registered for `event_name`, on
    /// any target, in registration order.
    ///
    /// A panicking listener is logged and does not stop the others.
    pub fn raise(&self, event_name: &str, payload: Option<Rc<dyn Any>>) -> &Self {
        let mut listeners: Vec<(u64, NativeListener)> = {
            let state = self.state.borrow();
            let RegistryState::Active(active) = &*state else {
                return self;
            };
            active
                .records
                .values()
                .filter_map(|by_name| by_name.get(event_name))
                .flatten()
                .map(|record| (record.seq, Rc::clone(&record.native)))
                .collect()
        };
        listeners.sort_by_key(|(seq, _)| *seq);

        let event = Event::new(event_name, payload);
        for (_, listener) in listeners {
            listener(&event);
        }
        self
    }

    /// Whether any listener for `event_name` is attached to `target`.
    pub fn is_observed(&self, target: &Rc<dyn EventTarget>, event_name: &str) -> bool {
        let state = self.state.borrow();
        let RegistryState::Active(active) = &*state else {
            return false;
        };
        active
            .target_ids
            .get(target)
            .and_then(|target_id| active.records.get(&target_id))
            .and_then(|by_name| by_name.get(event_name))
            .is_some_and(|list| !list.is_empty())
    }

    /// Number of attached listeners.
    pub fn len(&self) -> usize {
        match &*self.state.borrow() {
            RegistryState::Active(active) => active
                .records
                .values()
                .flat_map(|by_name| by_name.values())
                .map(|list| list.len())
                .sum(),
            RegistryState::Disposed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detaches every listener and turns later registrations into no-ops.
    pub fn dispose(&self) {
        let previous = mem::replace(&mut *self.state.borrow_mut(), RegistryState::Disposed);
        if let RegistryState::Active(mut active) = previous {
            let records = active.take_all();
            log::debug!("disposing event registry with {} listeners", records.len());
            for record in records {
                record.detach();
            }
        }
    }
}

impl<O: 'static> Drop for EventListenerRegistry<O> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<O: 'static> fmt::Debug for EventListenerRegistry<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListenerRegistry")
            .field("disposed", &self.is_disposed())
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/event_registry_tests.rs"]
mod tests;
