//! Deterministic hosts for testing code built on `cadence-core`.
//!
//! [`TestHost`] runs timers and animation frames against a virtual clock that
//! only moves when a test advances it. [`TestEventTarget`] records attached
//! listeners and dispatches events to them on demand.

mod event_target;
mod host;

pub use event_target::TestEventTarget;
pub use host::TestHost;
