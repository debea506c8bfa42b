use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::collections::map::HashMap;

use super::arg::{Arg, NormalizedArg, PrimitiveKey};
use super::memoize::{MemoizeOptions, MemoizedFn, Nullish};
use super::memoizer::Memoizer;

/// Boxed primitives kept across a reset before the box cache is cleared.
pub const PRIMITIVE_BOX_CACHE_LIMIT: usize = 4096;

struct NullSentinel;
struct UndefinedSentinel;

struct ContextInner {
    generation: Cell<u64>,
    boxes: RefCell<HashMap<PrimitiveKey, Rc<dyn Any>>>,
    null: Rc<dyn Any>,
    undefined: Rc<dyn Any>,
}

/// Shared state of a family of memoized functions: the generation counter
/// that [`MemoContext::reset`] bumps and the cache of boxed primitives that
/// gives equal primitive arguments a common identity.
#[derive(Clone)]
pub struct MemoContext {
    inner: Rc<ContextInner>,
}

impl MemoContext {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ContextInner {
                generation: Cell::new(0),
                boxes: RefCell::new(HashMap::default()),
                null: Rc::new(NullSentinel),
                undefined: Rc::new(UndefinedSentinel),
            }),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    /// Invalidates every function memoized through this context. Caches are
    /// dropped lazily, on each function's next call.
    pub fn reset(&self) {
        self.inner.generation.set(self.inner.generation.get() + 1);
        let mut boxes = self.inner.boxes.borrow_mut();
        if boxes.len() > PRIMITIVE_BOX_CACHE_LIMIT {
            log::debug!("clearing {} boxed memo keys", boxes.len());
            boxes.clear();
        }
    }

    pub fn boxed_primitives(&self) -> usize {
        self.inner.boxes.borrow().len()
    }

    pub fn normalize_arg(&self, arg: &Arg) -> NormalizedArg {
        let key = match arg {
            Arg::Null => return NormalizedArg::new(Rc::clone(&self.inner.null)),
            Arg::Undefined => return NormalizedArg::new(Rc::clone(&self.inner.undefined)),
            Arg::Object(object) => return NormalizedArg::new(Rc::clone(object)),
            Arg::Bool(value) => PrimitiveKey::Bool(*value),
            Arg::Int(value) => PrimitiveKey::Int(*value),
            Arg::Float(value) => PrimitiveKey::from_f64(*value),
            Arg::Str(value) => PrimitiveKey::Str(Rc::clone(value)),
        };
        let mut boxes = self.inner.boxes.borrow_mut();
        let boxed = boxes
            .entry(key.clone())
            .or_insert_with(|| Rc::new(key) as Rc<dyn Any>);
        NormalizedArg::new(Rc::clone(boxed))
    }

    pub fn memoize_function<R, E, F>(&self, func: F, options: MemoizeOptions) -> MemoizedFn<R, E>
    where
        R: Clone + Nullish + 'static,
        E: Clone + 'static,
        F: Fn(&[Arg]) -> Result<R, E> + 'static,
    {
        MemoizedFn::new(self.clone(), Box::new(func), options)
    }

    pub fn create_memoizer<R, F>(&self, func: F) -> Memoizer<R>
    where
        R: Clone + 'static,
        F: Fn(&Arg) -> R + 'static,
    {
        Memoizer::new(func)
    }
}

impl Default for MemoContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoContext")
            .field("generation", &self.generation())
            .field("boxed_primitives", &self.boxed_primitives())
            .finish()
    }
}

thread_local! {
    static DEFAULT_CONTEXT: MemoContext = MemoContext::new();
}

/// The context behind the free memoization functions on this thread.
pub fn default_context() -> MemoContext {
    DEFAULT_CONTEXT.with(MemoContext::clone)
}
