#![doc = r"Lifecycle-bound timers, event listeners and memoization for interactive components."]

pub mod async_controller;
mod collections;
pub mod debounce;
pub mod delay;
pub mod error;
pub mod event_registry;
pub mod host_queue;
pub mod id_pool;
pub mod memo;
pub mod platform;
pub mod throttle;
pub mod timer_registry;

pub use async_controller::{AsyncController, ErrorHook};
pub use debounce::{DebounceOptions, Debounced};
pub use delay::Delay;
pub use error::{CallbackError, CallbackSource, DetachError};
pub use event_registry::{listener, Event, EventCallback, EventListenerRegistry, ListenerOptions};
pub use id_pool::{IdPool, SharedIdPool, TimerId};
pub use memo::{
    create_memoizer, memoize_function, normalize_arg, reset_memoizations, Arg, MemoContext,
    MemoizeOptions, MemoizedFn, Memoizer, Nullish,
};
pub use platform::{Clock, ContextResolver, EventTarget, FixedContext, HostContext};
pub use throttle::{ThrottleOptions, Throttled};
pub use timer_registry::{TimerKind, TimerRegistry};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
