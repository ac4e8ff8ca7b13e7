//! Declarative member descriptors.
//!
//! A class is declared as a mapping from member keys to [`Descriptor`]s.
//! Each descriptor is plain immutable data produced by a factory and a chain
//! of `with_*` steps:
//!
//! ```
//! use horizon_trellis::descriptor::{Descriptor, PropertyDescriptor, PropertyFlags};
//!
//! let volume: Descriptor = PropertyDescriptor::double()
//!     .with_range(0.0, 1.0)
//!     .with_default(0.5)
//!     .with_flags(PropertyFlags::ReadWrite)
//!     .into();
//! ```
//!
//! Numeric bounds are resolved on every step, so a numeric property always
//! carries a concrete `[min, max]` range and default.

use std::fmt;
use std::sync::Arc;

use horizon_trellis_core::{
    Accumulator, CoreResult, Instance, ParamFlags, ParamSpec, SignalFlags, SignalSpec,
    SimpleAction, TypeRegistry, Value, ValueKind,
};

use crate::error::{Error, Result};

/// Access semantics of a declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyFlags {
    /// Read-only; reads return the declared default.
    Constant,
    /// Readable and writable at any time.
    #[default]
    ReadWrite,
    /// Readable and writable, set during construction.
    Construct,
    /// Readable, set during construction and immutable afterwards.
    ConstructOnly,
}

impl PropertyFlags {
    /// The platform flags this maps onto.
    pub fn param_flags(self) -> ParamFlags {
        match self {
            Self::Constant => ParamFlags::READABLE,
            Self::ReadWrite => ParamFlags::READWRITE,
            Self::Construct => ParamFlags::READWRITE | ParamFlags::CONSTRUCT,
            Self::ConstructOnly => ParamFlags::READWRITE | ParamFlags::CONSTRUCT_ONLY,
        }
    }

    /// Whether the property is writable after construction.
    pub fn is_writable_after_construction(self) -> bool {
        matches!(self, Self::ReadWrite | Self::Construct)
    }
}

/// A numeric value kind a property can hold.
pub trait NumericKind: Copy {
    /// The value kind.
    const KIND: ValueKind;
    /// The lower end of the type range.
    const MIN: f64;
    /// The upper end of the type range.
    const MAX: f64;

    /// Convert a resolved number into a value of this kind.
    fn to_value(number: f64) -> Value;
}

impl NumericKind for i32 {
    const KIND: ValueKind = ValueKind::Int;
    const MIN: f64 = i32::MIN as f64;
    const MAX: f64 = i32::MAX as f64;

    fn to_value(number: f64) -> Value {
        Value::Int(number as i32)
    }
}

impl NumericKind for u32 {
    const KIND: ValueKind = ValueKind::UInt;
    const MIN: f64 = 0.0;
    const MAX: f64 = u32::MAX as f64;

    fn to_value(number: f64) -> Value {
        Value::UInt(number as u32)
    }
}

impl NumericKind for f64 {
    const KIND: ValueKind = ValueKind::Double;
    const MIN: f64 = f64::MIN;
    const MAX: f64 = f64::MAX;

    fn to_value(number: f64) -> Value {
        Value::Double(number)
    }
}

/// The kind of a declared property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// UTF-8 string.
    String,
    /// Boolean.
    Bool,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Double precision float.
    Double,
    /// Nullable reference to an instance of the named class.
    Object {
        /// Registered class name.
        type_name: String,
    },
    /// Value of the named registered enumeration.
    Enum {
        /// Registered enumeration name.
        type_name: String,
    },
    /// Opaque value of the named registered boxed type.
    Boxed {
        /// Registered boxed type name.
        type_name: String,
    },
}

impl PropertyKind {
    /// The value kind properties of this kind hold.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::String => ValueKind::String,
            Self::Bool => ValueKind::Bool,
            Self::Int32 => ValueKind::Int,
            Self::UInt32 => ValueKind::UInt,
            Self::Double => ValueKind::Double,
            Self::Object { .. } => ValueKind::Object,
            Self::Enum { .. } => ValueKind::Enum,
            Self::Boxed { .. } => ValueKind::Boxed,
        }
    }

    fn type_range(&self) -> Option<(f64, f64)> {
        match self {
            Self::Int32 => Some((<i32 as NumericKind>::MIN, <i32 as NumericKind>::MAX)),
            Self::UInt32 => Some((<u32 as NumericKind>::MIN, <u32 as NumericKind>::MAX)),
            Self::Double => Some((<f64 as NumericKind>::MIN, <f64 as NumericKind>::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object { type_name } => write!(f, "object<{type_name}>"),
            Self::Enum { type_name } => write!(f, "enum<{type_name}>"),
            Self::Boxed { type_name } => write!(f, "boxed<{type_name}>"),
            other => write!(f, "{}", other.value_kind()),
        }
    }
}

/// A resolved numeric range and default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericBounds {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Default value.
    pub default: f64,
}

impl NumericBounds {
    /// Resolve bounds from explicit values and the type range.
    ///
    /// Explicit values win. Without an explicit default, `0` is used when it
    /// lies inside the range, otherwise the nearest bound.
    pub fn resolve(
        type_range: (f64, f64),
        min: Option<f64>,
        max: Option<f64>,
        default: Option<f64>,
    ) -> Self {
        let min = min.unwrap_or(type_range.0);
        let max = max.unwrap_or(type_range.1);
        let default = default.unwrap_or(if min > 0.0 {
            min
        } else if max < 0.0 {
            max
        } else {
            0.0
        });
        Self { min, max, default }
    }

    /// Whether `min <= max`.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }

    /// Constrain `number` to the range, truncating first if `integral`.
    pub fn apply(&self, number: f64, integral: bool) -> f64 {
        let number = if integral { number.trunc() } else { number };
        number.max(self.min).min(self.max)
    }
}

/// Declaration of a property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    kind: PropertyKind,
    flags: PropertyFlags,
    nick: Option<String>,
    blurb: Option<String>,
    explicit_min: Option<f64>,
    explicit_max: Option<f64>,
    default: Option<Value>,
    bounds: Option<NumericBounds>,
}

impl PropertyDescriptor {
    fn new(kind: PropertyKind) -> Self {
        let mut descriptor = Self {
            kind,
            flags: PropertyFlags::default(),
            nick: None,
            blurb: None,
            explicit_min: None,
            explicit_max: None,
            default: None,
            bounds: None,
        };
        descriptor.resolve();
        descriptor
    }

    fn resolve(&mut self) {
        self.bounds = self.kind.type_range().map(|range| {
            NumericBounds::resolve(
                range,
                self.explicit_min,
                self.explicit_max,
                self.default.as_ref().and_then(Value::as_f64),
            )
        });
    }

    /// A string property.
    pub fn string() -> Self {
        Self::new(PropertyKind::String)
    }

    /// A boolean property.
    pub fn boolean() -> Self {
        Self::new(PropertyKind::Bool)
    }

    /// A numeric property of kind `T`.
    pub fn numeric<T: NumericKind>() -> Self {
        Self::new(match T::KIND {
            ValueKind::Int => PropertyKind::Int32,
            ValueKind::UInt => PropertyKind::UInt32,
            _ => PropertyKind::Double,
        })
    }

    /// A signed 32-bit integer property.
    pub fn int32() -> Self {
        Self::numeric::<i32>()
    }

    /// An unsigned 32-bit integer property.
    pub fn uint32() -> Self {
        Self::numeric::<u32>()
    }

    /// A double property.
    pub fn double() -> Self {
        Self::numeric::<f64>()
    }

    /// A nullable reference to any instance.
    pub fn object() -> Self {
        Self::new(PropertyKind::Object {
            type_name: "Object".to_owned(),
        })
    }

    /// A property holding values of the registered enumeration `type_name`.
    pub fn enumeration(type_name: &str) -> Self {
        Self::new(PropertyKind::Enum {
            type_name: type_name.to_owned(),
        })
    }

    /// A property holding opaque values of the registered boxed `type_name`.
    pub fn boxed(type_name: &str) -> Self {
        Self::new(PropertyKind::Boxed {
            type_name: type_name.to_owned(),
        })
    }

    /// Restrict an object property to instances of `type_name`.
    ///
    /// Has no effect on other kinds.
    pub fn with_object_type(mut self, type_name: &str) -> Self {
        if let PropertyKind::Object { type_name: current } = &mut self.kind {
            *current = type_name.to_owned();
        }
        self
    }

    /// Set the access flags.
    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the lower bound of a numeric property.
    pub fn with_min(mut self, min: f64) -> Self {
        self.explicit_min = Some(min);
        self.resolve();
        self
    }

    /// Set the upper bound of a numeric property.
    pub fn with_max(mut self, max: f64) -> Self {
        self.explicit_max = Some(max);
        self.resolve();
        self
    }

    /// Set both bounds of a numeric property.
    pub fn with_range(self, min: f64, max: f64) -> Self {
        self.with_min(min).with_max(max)
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.resolve();
        self
    }

    /// Set the human-readable nick.
    pub fn with_nick(mut self, nick: &str) -> Self {
        self.nick = Some(nick.to_owned());
        self
    }

    /// Set the description.
    pub fn with_blurb(mut self, blurb: &str) -> Self {
        self.blurb = Some(blurb.to_owned());
        self
    }

    /// The property kind.
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// The access flags.
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    /// The resolved numeric bounds, `None` for non-numeric kinds.
    pub fn bounds(&self) -> Option<NumericBounds> {
        self.bounds
    }

    /// The explicitly declared default, if any.
    pub fn explicit_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// The resolved default for kinds that need no registry lookup.
    ///
    /// Enumerations without an explicit default resolve against the
    /// registered type in [`param_spec`](Self::param_spec).
    pub fn default_value(&self) -> Option<Value> {
        if let Some(bounds) = self.bounds {
            return Some(match self.kind {
                PropertyKind::Int32 => i32::to_value(bounds.default),
                PropertyKind::UInt32 => u32::to_value(bounds.default),
                _ => f64::to_value(bounds.default),
            });
        }
        match &self.kind {
            PropertyKind::String => Some(self.default.clone().unwrap_or(Value::String(String::new()))),
            PropertyKind::Bool => Some(self.default.clone().unwrap_or(Value::Bool(false))),
            PropertyKind::Object { .. } => Some(Value::Object(None)),
            PropertyKind::Boxed { .. } => Some(Value::Boxed(None)),
            PropertyKind::Enum { .. } => self.default.clone(),
            PropertyKind::Int32 | PropertyKind::UInt32 | PropertyKind::Double => None,
        }
    }

    fn check_default(&self, class: &str, name: &str) -> Result<()> {
        let Some(default) = &self.default else {
            return Ok(());
        };
        let expected = self.kind.value_kind();
        let acceptable = match expected {
            kind if kind.is_numeric() => default.kind().is_numeric(),
            ValueKind::Enum => matches!(default, Value::Enum(_) | Value::Int(_)),
            ValueKind::Object | ValueKind::Boxed => false,
            kind => default.kind() == kind,
        };
        if acceptable {
            Ok(())
        } else {
            Err(Error::configuration(
                class,
                format!(
                    "default of property '{name}' is {}, expected {expected}",
                    default.kind()
                ),
            ))
        }
    }

    fn check_bounds(&self, class: &str, name: &str) -> Result<NumericBounds> {
        let (Some(bounds), Some((low, high))) = (self.bounds, self.kind.type_range()) else {
            return Err(Error::configuration(class, format!("property '{name}' is not numeric")));
        };
        if bounds.min.is_nan() || bounds.max.is_nan() || bounds.default.is_nan() {
            return Err(Error::configuration(
                class,
                format!("bounds of property '{name}' must not be NaN"),
            ));
        }
        if !bounds.is_ordered() {
            return Err(Error::configuration(
                class,
                format!(
                    "property '{name}' has minimum {} above maximum {}",
                    bounds.min, bounds.max
                ),
            ));
        }
        if bounds.min < low || bounds.max > high {
            return Err(Error::configuration(
                class,
                format!(
                    "bounds of property '{name}' exceed the {} range",
                    self.kind
                ),
            ));
        }
        if bounds.default < bounds.min || bounds.default > bounds.max {
            return Err(Error::configuration(
                class,
                format!(
                    "default {} of property '{name}' lies outside [{}, {}]",
                    bounds.default, bounds.min, bounds.max
                ),
            ));
        }
        Ok(bounds)
    }

    /// Build the platform property spec for member `name` of `class`.
    ///
    /// Fails with [`Error::Configuration`] for a malformed descriptor and
    /// [`Error::UnsupportedPropertyKind`] when the referenced object, enum or
    /// boxed type is not registered.
    pub fn param_spec(&self, class: &str, name: &str, registry: &TypeRegistry) -> Result<ParamSpec> {
        self.check_default(class, name)?;

        let nick = self.nick.as_deref().unwrap_or("");
        let blurb = self.blurb.as_deref().unwrap_or("");
        let flags = self.flags.param_flags();
        let unsupported = || Error::unsupported_kind(class, name, self.kind.to_string());

        let spec = match &self.kind {
            PropertyKind::String => ParamSpec::string(
                name,
                nick,
                blurb,
                flags,
                self.default.as_ref().and_then(Value::as_str),
            ),
            PropertyKind::Bool => ParamSpec::boolean(
                name,
                nick,
                blurb,
                flags,
                self.default.as_ref().and_then(Value::as_bool).unwrap_or(false),
            ),
            PropertyKind::Int32 => {
                let bounds = self.check_bounds(class, name)?;
                ParamSpec::int(
                    name,
                    nick,
                    blurb,
                    flags,
                    bounds.min as i32,
                    bounds.max as i32,
                    bounds.apply(bounds.default, true) as i32,
                )
            }
            PropertyKind::UInt32 => {
                let bounds = self.check_bounds(class, name)?;
                ParamSpec::uint(
                    name,
                    nick,
                    blurb,
                    flags,
                    bounds.min as u32,
                    bounds.max as u32,
                    bounds.apply(bounds.default, true) as u32,
                )
            }
            PropertyKind::Double => {
                let bounds = self.check_bounds(class, name)?;
                ParamSpec::double(name, nick, blurb, flags, bounds.min, bounds.max, bounds.default)
            }
            PropertyKind::Object { type_name } => {
                let object_type = registry.lookup(type_name).ok_or_else(unsupported)?;
                ParamSpec::object(name, nick, blurb, flags, &object_type)
            }
            PropertyKind::Enum { type_name } => {
                let enum_type = registry.enum_type(type_name).ok_or_else(unsupported)?;
                let default = match &self.default {
                    Some(Value::Enum(v) | Value::Int(v)) => *v,
                    _ if enum_type.contains(0) => 0,
                    _ => enum_type
                        .values()
                        .first()
                        .map(|(v, _)| *v)
                        .ok_or_else(|| {
                            Error::configuration(class, format!("enum '{type_name}' has no values"))
                        })?,
                };
                ParamSpec::enumeration(name, nick, blurb, flags, &enum_type, default)
            }
            PropertyKind::Boxed { type_name } => {
                if !registry.has_boxed(type_name) {
                    return Err(unsupported());
                }
                ParamSpec::boxed(name, nick, blurb, flags, type_name)
            }
        };

        spec.map_err(|err| Error::configuration(class, err.to_string()))
    }
}

/// Declaration of a template child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildDescriptor {
    type_name: Option<String>,
}

impl ChildDescriptor {
    /// A child of any type.
    pub fn new() -> Self {
        Self::default()
    }

    /// A child that must be an instance of `type_name`.
    pub fn of_type(type_name: &str) -> Self {
        Self {
            type_name: Some(type_name.to_owned()),
        }
    }

    /// The expected type name.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }
}

/// The registered child name for member `key`: leading `_` stripped.
pub fn child_name(key: &str) -> &str {
    key.trim_start_matches('_')
}

/// Handler run when a declared action is activated.
pub type ActionHandler = Arc<dyn Fn(&Instance, Option<&Value>) + Send + Sync>;

/// Declaration of an action. The action name is the member key.
#[derive(Clone)]
pub struct ActionDescriptor {
    parameter_type: Option<ValueKind>,
    state: Option<Value>,
    enabled: bool,
    accels: Vec<String>,
    handler: Option<ActionHandler>,
}

impl Default for ActionDescriptor {
    fn default() -> Self {
        Self {
            parameter_type: None,
            state: None,
            enabled: true,
            accels: Vec::new(),
            handler: None,
        }
    }
}

impl ActionDescriptor {
    /// A parameterless, stateless, enabled action.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect an activation parameter of `kind`.
    pub fn with_parameter_type(mut self, kind: ValueKind) -> Self {
        self.parameter_type = Some(kind);
        self
    }

    /// Make the action stateful with initial `state`.
    pub fn with_state(mut self, state: impl Into<Value>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Append accelerators, in order.
    pub fn with_accels<I, S>(mut self, accels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accels.extend(accels.into_iter().map(Into::into));
        self
    }

    /// Run `handler` with the owning instance on activation.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Instance, Option<&Value>) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Start disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The accelerators.
    pub fn accels(&self) -> &[String] {
        &self.accels
    }

    /// The activation handler.
    pub fn handler(&self) -> Option<&ActionHandler> {
        self.handler.as_ref()
    }

    /// Construct the platform action named `name`.
    pub fn build(&self, name: &str) -> CoreResult<SimpleAction> {
        let action = match &self.state {
            Some(state) => SimpleAction::new_stateful(name, self.parameter_type, state.clone())?,
            None => SimpleAction::new(name, self.parameter_type)?,
        };
        action.set_enabled(self.enabled);
        Ok(action)
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("parameter_type", &self.parameter_type)
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .field("accels", &self.accels)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Declaration of a signal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalDescriptor {
    flags: Option<SignalFlags>,
    param_types: Vec<ValueKind>,
    return_type: Option<ValueKind>,
    accumulator: Option<Accumulator>,
}

impl SignalDescriptor {
    /// A signal without arguments or return value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal flags.
    pub fn with_flags(mut self, flags: SignalFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Set the argument kinds.
    pub fn with_param_types(mut self, param_types: impl IntoIterator<Item = ValueKind>) -> Self {
        self.param_types = param_types.into_iter().collect();
        self
    }

    /// Set the return kind.
    pub fn with_return_type(mut self, return_type: ValueKind) -> Self {
        self.return_type = Some(return_type);
        self
    }

    /// Set the accumulator.
    pub fn with_accumulator(mut self, accumulator: Accumulator) -> Self {
        self.accumulator = Some(accumulator);
        self
    }

    /// The platform signal spec for member `name`.
    pub fn signal_spec(&self, name: &str) -> SignalSpec {
        let mut spec = SignalSpec::new(name).with_param_types(self.param_types.iter().copied());
        if let Some(flags) = self.flags {
            spec = spec.with_flags(flags);
        }
        if let Some(return_type) = self.return_type {
            spec = spec.with_return_type(return_type);
        }
        if let Some(accumulator) = self.accumulator {
            spec = spec.with_accumulator(accumulator);
        }
        spec
    }
}

/// A declared class member.
#[derive(Debug, Clone)]
pub enum Descriptor {
    /// A property.
    Property(PropertyDescriptor),
    /// A template child.
    Child(ChildDescriptor),
    /// An action.
    Action(ActionDescriptor),
    /// A signal.
    Signal(SignalDescriptor),
}

impl Descriptor {
    /// A short name of the variant, for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Property(_) => "property",
            Self::Child(_) => "child",
            Self::Action(_) => "action",
            Self::Signal(_) => "signal",
        }
    }
}

impl From<PropertyDescriptor> for Descriptor {
    fn from(descriptor: PropertyDescriptor) -> Self {
        Self::Property(descriptor)
    }
}

impl From<ChildDescriptor> for Descriptor {
    fn from(descriptor: ChildDescriptor) -> Self {
        Self::Child(descriptor)
    }
}

impl From<ActionDescriptor> for Descriptor {
    fn from(descriptor: ActionDescriptor) -> Self {
        Self::Action(descriptor)
    }
}

impl From<SignalDescriptor> for Descriptor {
    fn from(descriptor: SignalDescriptor) -> Self {
        Self::Signal(descriptor)
    }
}
