use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::arg::{Arg, NormalizedArg};
use super::context::MemoContext;
use super::trie::MemoNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoizeOptions {
    /// Cached outcomes allowed before the whole cache is dropped; 0 disables
    /// the limit.
    pub max_cache_size: usize,
    /// Recompute whenever the cached value is nullish.
    pub ignore_null_or_undefined_result: bool,
}

impl Default for MemoizeOptions {
    fn default() -> Self {
        Self {
            max_cache_size: 100,
            ignore_null_or_undefined_result: false,
        }
    }
}

impl MemoizeOptions {
    pub fn with_max_cache_size(max_cache_size: usize) -> Self {
        Self {
            max_cache_size,
            ..Self::default()
        }
    }
}

/// Values that can stand for "no result".
pub trait Nullish {
    fn is_nullish(&self) -> bool {
        false
    }
}

impl<T> Nullish for Option<T> {
    fn is_nullish(&self) -> bool {
        self.is_none()
    }
}

impl Nullish for Arg {
    fn is_nullish(&self) -> bool {
        self.is_null_or_undefined()
    }
}

impl<T: Nullish + ?Sized> Nullish for Rc<T> {
    fn is_nullish(&self) -> bool {
        (**self).is_nullish()
    }
}

impl<T: Nullish + ?Sized> Nullish for Box<T> {
    fn is_nullish(&self) -> bool {
        (**self).is_nullish()
    }
}

macro_rules! never_nullish {
    ($($ty:ty),* $(,)?) => {
        $(impl Nullish for $ty {})*
    };
}

never_nullish!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    str, String,
);

impl<T> Nullish for Vec<T> {}

type MemoFn<R, E> = Box<dyn Fn(&[Arg]) -> Result<R, E> + 'static>;

struct CacheState<R, E> {
    root: Option<MemoNode<R, E>>,
    generation: u64,
    count: usize,
}

impl<R, E> CacheState<R, E> {
    fn root_for(&mut self, context: &MemoContext, max_cache_size: usize) -> &mut MemoNode<R, E> {
        let generation = context.generation();
        let stale = self.generation != generation
            || (max_cache_size > 0 && self.count > max_cache_size);
        if stale {
            self.root = None;
        }
        if self.root.is_none() {
            self.generation = generation;
            self.count = 0;
        }
        self.root.get_or_insert_with(MemoNode::new)
    }
}

enum Lookup<R, E> {
    Hit(Result<R, E>),
    Miss,
}

struct MemoizedInner<R, E> {
    context: MemoContext,
    func: MemoFn<R, E>,
    options: MemoizeOptions,
    cache: RefCell<CacheState<R, E>>,
}

/// A function of any arity whose outcomes, values and errors alike, are
/// cached per argument list.
pub struct MemoizedFn<R, E> {
    inner: Rc<MemoizedInner<R, E>>,
}

impl<R, E> Clone for MemoizedFn<R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<R, E> MemoizedFn<R, E>
where
    R: Clone + Nullish + 'static,
    E: Clone + 'static,
{
    pub(crate) fn new(context: MemoContext, func: MemoFn<R, E>, options: MemoizeOptions) -> Self {
        Self {
            inner: Rc::new(MemoizedInner {
                context,
                func,
                options,
                cache: RefCell::new(CacheState {
                    root: None,
                    generation: 0,
                    count: 0,
                }),
            }),
        }
    }

    pub fn call(&self, args: &[Arg]) -> Result<R, E> {
        let inner = &*self.inner;
        let path: Vec<NormalizedArg> = args
            .iter()
            .map(|arg| inner.context.normalize_arg(arg))
            .collect();

        if let Lookup::Hit(outcome) = self.lookup(&path) {
            return outcome;
        }

        let outcome = (inner.func)(args);

        let mut cache = inner.cache.borrow_mut();
        let cache = &mut *cache;
        let leaf = cache
            .root_for(&inner.context, inner.options.max_cache_size)
            .descend(&path);
        let fresh = leaf.is_empty();
        match &outcome {
            Ok(value) => {
                leaf.value = Some(value.clone());
                leaf.error = None;
            }
            Err(error) => {
                leaf.value = None;
                leaf.error = Some(error.clone());
            }
        }
        if fresh {
            cache.count += 1;
        }
        outcome
    }

    fn lookup(&self, path: &[NormalizedArg]) -> Lookup<R, E> {
        let inner = &*self.inner;
        let mut cache = inner.cache.borrow_mut();
        let leaf = cache
            .root_for(&inner.context, inner.options.max_cache_size)
            .descend(path);
        if let Some(error) = &leaf.error {
            return Lookup::Hit(Err(error.clone()));
        }
        match &leaf.value {
            Some(value)
                if !(inner.options.ignore_null_or_undefined_result && value.is_nullish()) =>
            {
                Lookup::Hit(Ok(value.clone()))
            }
            _ => Lookup::Miss,
        }
    }

    /// Number of cached outcomes in the current cache window.
    pub fn cache_size(&self) -> usize {
        self.inner.cache.borrow().count
    }

    pub fn options(&self) -> MemoizeOptions {
        self.inner.options
    }
}

impl<R, E> fmt::Debug for MemoizedFn<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.inner.cache.borrow();
        f.debug_struct("MemoizedFn")
            .field("options", &self.inner.options)
            .field("generation", &cache.generation)
            .field("cached", &cache.count)
            .finish()
    }
}
