use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::collections::map::HashMap;

use super::arg::Arg;

struct ObjectCache<R> {
    entries: HashMap<usize, (Weak<dyn Any>, R)>,
    prune_at: usize,
}

impl<R> ObjectCache<R> {
    fn get(&self, object: &Rc<dyn Any>) -> Option<&R> {
        let address = address_of(object);
        let (key, value) = self.entries.get(&address)?;
        let live = key.upgrade().is_some_and(|live| address_of(&live) == address);
        live.then_some(value)
    }

    fn insert(&mut self, object: &Rc<dyn Any>, value: R) {
        if self.entries.len() >= self.prune_at {
            self.entries.retain(|_, (key, _)| key.strong_count() > 0);
            self.prune_at = (self.entries.len() * 2).max(16);
        }
        self.entries.insert(address_of(object), (Rc::downgrade(object), value));
    }

    fn live_len(&self) -> usize {
        self.entries
            .values()
            .filter(|(key, _)| key.strong_count() > 0)
            .count()
    }
}

fn address_of(object: &Rc<dyn Any>) -> usize {
    Rc::as_ptr(object) as *const () as usize
}

struct MemoizerInner<R> {
    func: Box<dyn Fn(&Arg) -> R + 'static>,
    cache: RefCell<ObjectCache<R>>,
}

/// Single-argument memoization keyed by object identity.
///
/// Entries hold their argument weakly, so caching never extends an object's
/// lifetime. Non-object arguments are passed straight through.
pub struct Memoizer<R> {
    inner: Rc<MemoizerInner<R>>,
}

impl<R> Clone for Memoizer<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<R: Clone + 'static> Memoizer<R> {
    pub fn new(func: impl Fn(&Arg) -> R + 'static) -> Self {
        Self {
            inner: Rc::new(MemoizerInner {
                func: Box::new(func),
                cache: RefCell::new(ObjectCache {
                    entries: HashMap::default(),
                    prune_at: 16,
                }),
            }),
        }
    }

    pub fn get(&self, arg: &Arg) -> R {
        let Arg::Object(object) = arg else {
            return (self.inner.func)(arg);
        };
        if let Some(value) = self.inner.cache.borrow().get(object) {
            return value.clone();
        }
        let value = (self.inner.func)(arg);
        self.inner.cache.borrow_mut().insert(object, value.clone());
        value
    }

    /// Entries whose object is still alive.
    pub fn len(&self) -> usize {
        self.inner.cache.borrow().live_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> fmt::Debug for Memoizer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoizer")
            .field("entries", &self.inner.cache.borrow().entries.len())
            .finish()
    }
}
