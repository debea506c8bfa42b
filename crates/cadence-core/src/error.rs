use std::any::Any;
use std::fmt;

/// Where a failing callback was scheduled from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallbackSource {
    Timeout,
    Interval,
    Immediate,
    AnimationFrame,
    Listener,
}

impl fmt::Display for CallbackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackSource::Timeout => "timeout",
            CallbackSource::Interval => "interval",
            CallbackSource::Immediate => "immediate",
            CallbackSource::AnimationFrame => "animation frame",
            CallbackSource::Listener => "event listener",
        };
        f.write_str(name)
    }
}

/// A user callback panicked while being run on behalf of a controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackError {
    pub source: CallbackSource,
    pub message: String,
}

impl CallbackError {
    pub(crate) fn from_panic(source: CallbackSource, payload: Box<dyn Any + Send>) -> Self {
        Self {
            source,
            message: panic_message(payload.as_ref()),
        }
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} callback panicked: {}", self.source, self.message)
    }
}

impl std::error::Error for CallbackError {}

/// An event target refused to detach a listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetachError {
    NotAttached { event_name: String },
    Rejected { event_name: String, reason: String },
}

impl fmt::Display for DetachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetachError::NotAttached { event_name } => {
                write!(f, "no `{event_name}` listener attached")
            }
            DetachError::Rejected { event_name, reason } => {
                write!(f, "detaching `{event_name}` listener failed: {reason}")
            }
        }
    }
}

impl std::error::Error for DetachError {}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
