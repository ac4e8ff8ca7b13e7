//! Property specifications.
//!
//! A [`ParamSpec`] describes one property of a registered class: its
//! canonical name, human-readable nick and blurb, access flags, value kind
//! and the kind-specific bounds and default. Specs are built with one
//! constructor per kind and are immutable afterwards.
//!
//! Property names are canonicalized on construction: underscores become
//! hyphens, so `max_value` and `max-value` name the same property.

use std::fmt;

use bitflags::bitflags;

use crate::error::{CoreError, CoreResult};
use crate::types::{ClassHandle, EnumType};
use crate::value::{Value, ValueKind};

bitflags! {
    /// Access flags of a property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParamFlags: u32 {
        /// The property can be read.
        const READABLE = 1 << 0;
        /// The property can be written.
        const WRITABLE = 1 << 1;
        /// The property is set during construction.
        const CONSTRUCT = 1 << 2;
        /// The property is set during construction and never again.
        const CONSTRUCT_ONLY = 1 << 3;
        /// Readable and writable.
        const READWRITE = Self::READABLE.bits() | Self::WRITABLE.bits();
    }
}

/// Translate a property or signal name to its canonical form.
///
/// The canonical separator is `-`; `_` is accepted on input and rewritten.
pub fn canonical_name(name: &str) -> String {
    name.replace('_', "-")
}

/// Check that a canonical name is a valid identifier.
pub(crate) fn validate_name(name: &str) -> CoreResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidName {
            name: name.to_owned(),
        })
    }
}

/// Kind-specific part of a [`ParamSpec`].
#[derive(Clone)]
pub enum ParamKind {
    /// String property.
    String {
        /// Default value, `None` for a null string.
        default: Option<String>,
    },
    /// Boolean property.
    Bool {
        /// Default value.
        default: bool,
    },
    /// Signed integer property.
    Int {
        /// Lower bound.
        min: i32,
        /// Upper bound.
        max: i32,
        /// Default value.
        default: i32,
    },
    /// Unsigned integer property.
    UInt {
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
        /// Default value.
        default: u32,
    },
    /// Double property.
    Double {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
        /// Default value.
        default: f64,
    },
    /// Instance reference; always nullable and null by default.
    Object {
        /// Values must be instances of this class or a subclass.
        object_type: ClassHandle,
    },
    /// Registered enumeration.
    Enum {
        /// The enumeration type.
        enum_type: EnumType,
        /// Default value.
        default: i32,
    },
    /// Opaque value; null by default.
    Boxed {
        /// The registered boxed type name.
        type_name: String,
    },
}

impl ParamKind {
    /// The value kind this spec holds.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::String { .. } => ValueKind::String,
            Self::Bool { .. } => ValueKind::Bool,
            Self::Int { .. } => ValueKind::Int,
            Self::UInt { .. } => ValueKind::UInt,
            Self::Double { .. } => ValueKind::Double,
            Self::Object { .. } => ValueKind::Object,
            Self::Enum { .. } => ValueKind::Enum,
            Self::Boxed { .. } => ValueKind::Boxed,
        }
    }
}

/// Description of one property of a registered class.
#[derive(Clone)]
pub struct ParamSpec {
    name: String,
    nick: String,
    blurb: String,
    flags: ParamFlags,
    kind: ParamKind,
}

impl ParamSpec {
    fn build(name: &str, nick: &str, blurb: &str, flags: ParamFlags, kind: ParamKind) -> CoreResult<Self> {
        let name = canonical_name(name);
        validate_name(&name)?;
        if flags.contains(ParamFlags::CONSTRUCT) && flags.contains(ParamFlags::CONSTRUCT_ONLY) {
            return Err(CoreError::InvalidParamSpec {
                name,
                message: "CONSTRUCT and CONSTRUCT_ONLY are mutually exclusive".into(),
            });
        }
        Ok(Self {
            nick: if nick.is_empty() { name.clone() } else { nick.to_owned() },
            blurb: blurb.to_owned(),
            name,
            flags,
            kind,
        })
    }

    fn check_range<T: PartialOrd + fmt::Debug>(name: &str, min: T, max: T, default: T) -> CoreResult<()> {
        if min > max {
            return Err(CoreError::InvalidParamSpec {
                name: name.to_owned(),
                message: format!("minimum {min:?} exceeds maximum {max:?}"),
            });
        }
        if default < min || default > max {
            return Err(CoreError::InvalidParamSpec {
                name: name.to_owned(),
                message: format!("default {default:?} outside [{min:?}, {max:?}]"),
            });
        }
        Ok(())
    }

    /// A string property.
    pub fn string(name: &str, nick: &str, blurb: &str, flags: ParamFlags, default: Option<&str>) -> CoreResult<Self> {
        Self::build(
            name,
            nick,
            blurb,
            flags,
            ParamKind::String {
                default: default.map(str::to_owned),
            },
        )
    }

    /// A boolean property.
    pub fn boolean(name: &str, nick: &str, blurb: &str, flags: ParamFlags, default: bool) -> CoreResult<Self> {
        Self::build(name, nick, blurb, flags, ParamKind::Bool { default })
    }

    /// A signed integer property.
    #[allow(clippy::too_many_arguments)]
    pub fn int(
        name: &str,
        nick: &str,
        blurb: &str,
        flags: ParamFlags,
        min: i32,
        max: i32,
        default: i32,
    ) -> CoreResult<Self> {
        Self::check_range(name, min, max, default)?;
        Self::build(name, nick, blurb, flags, ParamKind::Int { min, max, default })
    }

    /// An unsigned integer property.
    #[allow(clippy::too_many_arguments)]
    pub fn uint(
        name: &str,
        nick: &str,
        blurb: &str,
        flags: ParamFlags,
        min: u32,
        max: u32,
        default: u32,
    ) -> CoreResult<Self> {
        Self::check_range(name, min, max, default)?;
        Self::build(name, nick, blurb, flags, ParamKind::UInt { min, max, default })
    }

    /// A double property.
    #[allow(clippy::too_many_arguments)]
    pub fn double(
        name: &str,
        nick: &str,
        blurb: &str,
        flags: ParamFlags,
        min: f64,
        max: f64,
        default: f64,
    ) -> CoreResult<Self> {
        if min.is_nan() || max.is_nan() || default.is_nan() {
            return Err(CoreError::InvalidParamSpec {
                name: name.to_owned(),
                message: "bounds and default must not be NaN".into(),
            });
        }
        Self::check_range(name, min, max, default)?;
        Self::build(name, nick, blurb, flags, ParamKind::Double { min, max, default })
    }

    /// An object reference property holding instances of `object_type`.
    pub fn object(name: &str, nick: &str, blurb: &str, flags: ParamFlags, object_type: &ClassHandle) -> CoreResult<Self> {
        Self::build(
            name,
            nick,
            blurb,
            flags,
            ParamKind::Object {
                object_type: object_type.clone(),
            },
        )
    }

    /// An enumeration property.
    pub fn enumeration(
        name: &str,
        nick: &str,
        blurb: &str,
        flags: ParamFlags,
        enum_type: &EnumType,
        default: i32,
    ) -> CoreResult<Self> {
        if !enum_type.contains(default) {
            return Err(CoreError::InvalidParamSpec {
                name: name.to_owned(),
                message: format!("default {default} is not a value of '{}'", enum_type.name()),
            });
        }
        Self::build(
            name,
            nick,
            blurb,
            flags,
            ParamKind::Enum {
                enum_type: enum_type.clone(),
                default,
            },
        )
    }

    /// An opaque boxed property of a registered boxed type.
    pub fn boxed(name: &str, nick: &str, blurb: &str, flags: ParamFlags, type_name: &str) -> CoreResult<Self> {
        Self::build(
            name,
            nick,
            blurb,
            flags,
            ParamKind::Boxed {
                type_name: type_name.to_owned(),
            },
        )
    }

    /// The canonical property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The human-readable nick.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// The description.
    pub fn blurb(&self) -> &str {
        &self.blurb
    }

    /// The access flags.
    pub fn flags(&self) -> ParamFlags {
        self.flags
    }

    /// The kind-specific part of the spec.
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    /// The value kind this property holds.
    pub fn value_kind(&self) -> ValueKind {
        self.kind.value_kind()
    }

    /// Whether the property can be read.
    pub fn is_readable(&self) -> bool {
        self.flags.contains(ParamFlags::READABLE)
    }

    /// Whether the property can be written (possibly only at construction).
    pub fn is_writable(&self) -> bool {
        self.flags.contains(ParamFlags::WRITABLE)
    }

    /// Whether the property is written during construction.
    pub fn is_construct(&self) -> bool {
        self.flags
            .intersects(ParamFlags::CONSTRUCT | ParamFlags::CONSTRUCT_ONLY)
    }

    /// Whether the property rejects writes after construction.
    pub fn is_construct_only(&self) -> bool {
        self.flags.contains(ParamFlags::CONSTRUCT_ONLY)
    }

    /// The default value of the property.
    pub fn default_value(&self) -> Value {
        match &self.kind {
            ParamKind::String { default } => Value::String(default.clone().unwrap_or_default()),
            ParamKind::Bool { default } => Value::Bool(*default),
            ParamKind::Int { default, .. } => Value::Int(*default),
            ParamKind::UInt { default, .. } => Value::UInt(*default),
            ParamKind::Double { default, .. } => Value::Double(*default),
            ParamKind::Object { .. } => Value::Object(None),
            ParamKind::Enum { default, .. } => Value::Enum(*default),
            ParamKind::Boxed { .. } => Value::Boxed(None),
        }
    }

    /// Convert `value` to the kind this property holds.
    ///
    /// Numbers convert between numeric kinds by truncation toward zero,
    /// saturating at the target type's range. No clamping to the spec's
    /// bounds happens here. Objects must be instances of the declared type
    /// and enum values must belong to the enumeration.
    pub fn convert(&self, value: Value) -> CoreResult<Value> {
        let mismatch = |got: ValueKind| CoreError::TypeMismatch {
            property: self.name.clone(),
            expected: self.value_kind(),
            got,
        };
        match (&self.kind, value) {
            (ParamKind::Int { .. }, v) if v.kind().is_numeric() => {
                Ok(Value::Int(v.as_f64().map_or(0, |n| n as i32)))
            }
            (ParamKind::UInt { .. }, v) if v.kind().is_numeric() => {
                Ok(Value::UInt(v.as_f64().map_or(0, |n| n as u32)))
            }
            (ParamKind::Double { .. }, v) if v.kind().is_numeric() => {
                Ok(Value::Double(v.as_f64().unwrap_or_default()))
            }
            (ParamKind::String { .. }, v @ Value::String(_)) => Ok(v),
            (ParamKind::Bool { .. }, v @ Value::Bool(_)) => Ok(v),
            (ParamKind::Boxed { .. }, v @ Value::Boxed(_)) => Ok(v),
            (ParamKind::Enum { enum_type, .. }, Value::Enum(raw) | Value::Int(raw)) => {
                if enum_type.contains(raw) {
                    Ok(Value::Enum(raw))
                } else {
                    Err(CoreError::InvalidValue {
                        property: self.name.clone(),
                        message: format!("{raw} is not a value of '{}'", enum_type.name()),
                    })
                }
            }
            (ParamKind::Object { object_type }, Value::Object(obj)) => match obj {
                Some(instance) if !instance.class().is_a(object_type) => Err(CoreError::InvalidValue {
                    property: self.name.clone(),
                    message: format!(
                        "'{}' is not a '{}'",
                        instance.type_name(),
                        object_type.name()
                    ),
                }),
                obj => Ok(Value::Object(obj)),
            },
            (_, v) => Err(mismatch(v.kind())),
        }
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("kind", &self.value_kind())
            .field("flags", &self.flags)
            .field("default", &self.default_value())
            .finish()
    }
}
