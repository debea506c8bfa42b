//! Memoization over dynamically typed argument lists.
//!
//! [`MemoizedFn`] caches the outcome of every distinct argument list in a
//! trie keyed by argument identity, and drops the whole trie when its
//! [`MemoContext`] is reset or when it grows past its configured size.
//! [`Memoizer`] is the single-argument variant keyed by object identity.
//!
//! The free functions operate on a thread-local default context.

mod arg;
mod context;
mod memoize;
mod memoizer;
mod trie;

pub use arg::{Arg, NormalizedArg};
pub use context::{default_context, MemoContext, PRIMITIVE_BOX_CACHE_LIMIT};
pub use memoize::{MemoizeOptions, MemoizedFn, Nullish};
pub use memoizer::Memoizer;

pub fn memoize_function<R, E, F>(func: F, options: MemoizeOptions) -> MemoizedFn<R, E>
where
    R: Clone + Nullish + 'static,
    E: Clone + 'static,
    F: Fn(&[Arg]) -> Result<R, E> + 'static,
{
    default_context().memoize_function(func, options)
}

pub fn create_memoizer<R, F>(func: F) -> Memoizer<R>
where
    R: Clone + 'static,
    F: Fn(&Arg) -> R + 'static,
{
    Memoizer::new(func)
}

/// Invalidates every function memoized through the default context.
pub fn reset_memoizations() {
    default_context().reset();
}

pub fn normalize_arg(arg: &Arg) -> NormalizedArg {
    default_context().normalize_arg(arg)
}

#[cfg(test)]
#[path = "tests/memo_tests.rs"]
mod tests;
