//! Error types for the Horizon Trellis object platform.

use std::fmt;

use crate::value::ValueKind;

/// The error type for platform operations: type registration, property
/// access, signal emission and action dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A type, property, signal or action name is not a valid identifier.
    InvalidName {
        /// The rejected name.
        name: String,
    },
    /// A type with this name is already registered.
    DuplicateType {
        /// The type name.
        name: String,
    },
    /// A referenced type (parent, object, enum or boxed) is not registered.
    UnknownType {
        /// The missing type name.
        name: String,
    },
    /// The parent type is final and cannot be derived from.
    FinalParent {
        /// The parent type name.
        parent: String,
    },
    /// Abstract types cannot be instantiated.
    AbstractType {
        /// The type name.
        name: String,
    },
    /// A property is declared twice along a class chain.
    DuplicateProperty {
        /// The class declaring the duplicate.
        class: String,
        /// The property name.
        property: String,
    },
    /// A signal is declared twice along a class chain.
    DuplicateSignal {
        /// The class declaring the duplicate.
        class: String,
        /// The signal name.
        signal: String,
    },
    /// A property spec was constructed with inconsistent bounds or default.
    InvalidParamSpec {
        /// The property name.
        name: String,
        /// What was wrong.
        message: String,
    },
    /// The property does not exist on the class.
    PropertyNotFound {
        /// The instance's type name.
        class: String,
        /// The property name.
        property: String,
    },
    /// The property is not readable.
    PropertyNotReadable {
        /// The instance's type name.
        class: String,
        /// The property name.
        property: String,
    },
    /// The property is read-only.
    PropertyReadOnly {
        /// The instance's type name.
        class: String,
        /// The property name.
        property: String,
    },
    /// The property can only be set during construction.
    ConstructOnly {
        /// The instance's type name.
        class: String,
        /// The property name.
        property: String,
    },
    /// A value of the wrong kind was written to a property.
    TypeMismatch {
        /// The property name.
        property: String,
        /// The kind the property holds.
        expected: ValueKind,
        /// The kind that was supplied.
        got: ValueKind,
    },
    /// A value of the right kind is still not acceptable.
    InvalidValue {
        /// The property name.
        property: String,
        /// Why the value was rejected.
        message: String,
    },
    /// The signal does not exist on the class.
    SignalNotFound {
        /// The instance's type name.
        class: String,
        /// The signal name.
        signal: String,
    },
    /// Emission arguments do not match the signal's parameter types.
    ArgumentMismatch {
        /// The signal name.
        signal: String,
        /// What was wrong.
        message: String,
    },
    /// The handler id is unknown or already disconnected.
    HandlerNotFound,
    /// No action with this (detailed) name is reachable.
    ActionNotFound {
        /// The action name.
        name: String,
    },
    /// The action received a parameter of the wrong kind.
    ActionParameterMismatch {
        /// The action name.
        name: String,
    },
    /// The operation requires an application instance.
    NotAnApplication {
        /// The instance's type name.
        class: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { name } => write!(f, "Invalid name '{name}'"),
            Self::DuplicateType { name } => write!(f, "Type '{name}' is already registered"),
            Self::UnknownType { name } => write!(f, "Type '{name}' is not registered"),
            Self::FinalParent { parent } => {
                write!(f, "Type '{parent}' is final and cannot be derived from")
            }
            Self::AbstractType { name } => {
                write!(f, "Type '{name}' is abstract and cannot be instantiated")
            }
            Self::DuplicateProperty { class, property } => {
                write!(f, "Property '{property}' is already declared on '{class}'")
            }
            Self::DuplicateSignal { class, signal } => {
                write!(f, "Signal '{signal}' is already declared on '{class}'")
            }
            Self::InvalidParamSpec { name, message } => {
                write!(f, "Invalid property spec '{name}': {message}")
            }
            Self::PropertyNotFound { class, property } => {
                write!(f, "'{class}' has no property '{property}'")
            }
            Self::PropertyNotReadable { class, property } => {
                write!(f, "Property '{class}:{property}' is not readable")
            }
            Self::PropertyReadOnly { class, property } => {
                write!(f, "Property '{class}:{property}' is read-only")
            }
            Self::ConstructOnly { class, property } => {
                write!(f, "Property '{class}:{property}' can only be set at construction")
            }
            Self::TypeMismatch {
                property,
                expected,
                got,
            } => write!(
                f,
                "Property '{property}' type mismatch: expected {expected}, got {got}"
            ),
            Self::InvalidValue { property, message } => {
                write!(f, "Invalid value for property '{property}': {message}")
            }
            Self::SignalNotFound { class, signal } => {
                write!(f, "'{class}' has no signal '{signal}'")
            }
            Self::ArgumentMismatch { signal, message } => {
                write!(f, "Bad arguments for signal '{signal}': {message}")
            }
            Self::HandlerNotFound => write!(f, "Invalid or disconnected handler ID"),
            Self::ActionNotFound { name } => write!(f, "No action named '{name}'"),
            Self::ActionParameterMismatch { name } => {
                write!(f, "Action '{name}' received a parameter of the wrong kind")
            }
            Self::NotAnApplication { class } => {
                write!(f, "'{class}' is not an application")
            }
        }
    }
}

impl std::error::Error for CoreError {}

/// A specialized Result type for platform operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
