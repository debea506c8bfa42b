use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A dynamically typed argument to a memoized function.
///
/// Objects are compared by identity. Every other variant is compared by
/// value, with numbers following SameValueZero: `NaN` equals `NaN`, `+0`
/// equals `-0`, and an integral `Float` equals the matching `Int`.
#[derive(Clone)]
pub enum Arg {
    Null,
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Object(Rc<dyn Any>),
}

impl Arg {
    /// Wraps `value` in a fresh object with its own identity.
    pub fn object<T: Any>(value: T) -> Self {
        Arg::Object(Rc::new(value))
    }

    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Arg::Null | Arg::Undefined)
    }

    pub fn as_object(&self) -> Option<&Rc<dyn Any>> {
        match self {
            Arg::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_object()?.downcast_ref::<T>()
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Arg::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Arg::Int(value) => Some(*value as f64),
            Arg::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Null => f.write_str("Null"),
            Arg::Undefined => f.write_str("Undefined"),
            Arg::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Arg::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Arg::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Arg::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Arg::Object(object) => write!(f, "Object({:p})", Rc::as_ptr(object) as *const ()),
        }
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(Rc::from(value))
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Arg {
    fn from(value: Rc<str>) -> Self {
        Arg::Str(value)
    }
}

impl From<Rc<dyn Any>> for Arg {
    fn from(value: Rc<dyn Any>) -> Self {
        Arg::Object(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Null, Into::into)
    }
}

/// Value identity of a primitive argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum PrimitiveKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
}

impl PrimitiveKey {
    pub(crate) fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return PrimitiveKey::Float(f64::NAN.to_bits());
        }
        // Integral floats share keys with integers; -0.0 collapses onto 0.
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            return PrimitiveKey::Int(value as i64);
        }
        PrimitiveKey::Float(value.to_bits())
    }
}

/// An argument reduced to an identity usable as a cache key.
#[derive(Clone)]
pub struct NormalizedArg(Rc<dyn Any>);

impl NormalizedArg {
    pub(crate) fn new(value: Rc<dyn Any>) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Rc<dyn Any> {
        &self.0
    }

    /// Address of the underlying allocation.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &NormalizedArg) -> bool {
        self.identity() == other.identity()
    }
}

impl PartialEq for NormalizedArg {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for NormalizedArg {}

impl Hash for NormalizedArg {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for NormalizedArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NormalizedArg({:#x})", self.identity())
    }
}
