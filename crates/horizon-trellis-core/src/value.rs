//! Dynamically typed values carried by properties, signals and actions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::instance::Instance;

/// The kind tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// UTF-8 string.
    String,
    /// Boolean.
    Bool,
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    UInt,
    /// Double precision float.
    Double,
    /// Nullable reference to another instance.
    Object,
    /// Value of a registered enumeration.
    Enum,
    /// Nullable opaque value.
    Boxed,
}

impl ValueKind {
    /// Whether values of this kind are numbers.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::UInt | Self::Double)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int32",
            Self::UInt => "uint32",
            Self::Double => "double",
            Self::Object => "object",
            Self::Enum => "enum",
            Self::Boxed => "boxed",
        };
        f.write_str(name)
    }
}

/// A dynamically typed value.
///
/// Object and boxed values compare by identity.
#[derive(Clone)]
pub enum Value {
    /// UTF-8 string.
    String(String),
    /// Boolean.
    Bool(bool),
    /// Signed 32-bit integer.
    Int(i32),
    /// Unsigned 32-bit integer.
    UInt(u32),
    /// Double precision float.
    Double(f64),
    /// Nullable instance reference.
    Object(Option<Instance>),
    /// Enumeration value.
    Enum(i32),
    /// Nullable opaque value.
    Boxed(Option<Arc<dyn Any + Send + Sync>>),
}

impl Value {
    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::UInt(_) => ValueKind::UInt,
            Self::Double(_) => ValueKind::Double,
            Self::Object(_) => ValueKind::Object,
            Self::Enum(_) => ValueKind::Enum,
            Self::Boxed(_) => ValueKind::Boxed,
        }
    }

    /// The numeric value widened to `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(v) => Some(f64::from(v)),
            Self::UInt(v) => Some(f64::from(v)),
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    /// The string, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// The integer, if this is a signed integer.
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// The integer, if this is an unsigned integer.
    pub fn as_uint(&self) -> Option<u32> {
        match *self {
            Self::UInt(v) => Some(v),
            _ => None,
        }
    }

    /// The float, if this is a double.
    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    /// The enumeration value, if this is an enum.
    pub fn as_enum(&self) -> Option<i32> {
        match *self {
            Self::Enum(v) => Some(v),
            _ => None,
        }
    }

    /// The referenced instance, if this is a non-null object.
    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Self::Object(obj) => obj.as_ref(),
            _ => None,
        }
    }

    /// Downcast a non-null boxed value.
    pub fn downcast_boxed<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Boxed(Some(inner)) => inner.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Whether this is a null object or null boxed value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Object(None) | Self::Boxed(None))
    }

    /// A boxed value wrapping `value`.
    pub fn boxed<T: Any + Send + Sync>(value: T) -> Self {
        Self::Boxed(Some(Arc::new(value)))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => match (a, b) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                (None, None) => true,
                _ => false,
            },
            (Self::Boxed(a), Self::Boxed(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}u"),
            Self::Double(v) => write!(f, "{v:?}"),
            Self::Enum(v) => write!(f, "enum({v})"),
            Self::Object(Some(obj)) => write!(f, "<{}#{}>", obj.type_name(), obj.id()),
            Self::Object(None) => f.write_str("<null object>"),
            Self::Boxed(Some(_)) => f.write_str("<boxed>"),
            Self::Boxed(None) => f.write_str("<null boxed>"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<Instance> for Value {
    fn from(value: Instance) -> Self {
        Self::Object(Some(value))
    }
}

impl From<Option<Instance>> for Value {
    fn from(value: Option<Instance>) -> Self {
        Self::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_widening() {
        assert_eq!(Value::Int(-3).as_f64(), Some(-3.0));
        assert_eq!(Value::UInt(7).as_f64(), Some(7.0));
        assert_eq!(Value::Double(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::from("x").as_f64(), None);
    }

    #[test]
    fn test_boxed_identity() {
        let a = Value::boxed(5u8);
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Value::boxed(5u8));
        assert_eq!(a.downcast_boxed::<u8>().as_deref(), Some(&5));
        assert!(Value::Boxed(None).is_null());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ValueKind::Int.to_string(), "int32");
        assert!(ValueKind::Double.is_numeric());
        assert!(!ValueKind::Enum.is_numeric());
    }
}
