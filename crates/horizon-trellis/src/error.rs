//! Error types for class declaration, registration and construction.

use horizon_trellis_core::CoreError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while declaring, registering or instantiating a class.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A descriptor or class option is malformed.
    #[error("Invalid declaration for '{class}': {message}")]
    Configuration { class: String, message: String },

    /// A property refers to an enum, object or boxed type that is not registered.
    #[error("Property '{class}:{property}' uses unsupported kind '{kind}'")]
    UnsupportedPropertyKind {
        class: String,
        property: String,
        kind: String,
    },

    /// A writable property has no accessor pair on the class or the instance.
    #[error("Writable property '{class}:{property}' has no accessor pair")]
    AccessorContract { class: String, property: String },

    /// A template child is not an instance of the declared type.
    #[error("Child '{class}:{child}' must be '{expected}', got '{actual}'")]
    ChildTypeMismatch {
        class: String,
        child: String,
        expected: String,
        actual: String,
    },

    /// The platform refused an operation.
    #[error(transparent)]
    Platform(#[from] CoreError),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported kind error.
    pub fn unsupported_kind(
        class: impl Into<String>,
        property: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self::UnsupportedPropertyKind {
            class: class.into(),
            property: property.into(),
            kind: kind.into(),
        }
    }

    /// Create an accessor contract error.
    pub fn accessor_contract(class: impl Into<String>, property: impl Into<String>) -> Self {
        Self::AccessorContract {
            class: class.into(),
            property: property.into(),
        }
    }
}

/// A failure inside a ready hook.
///
/// Ready hooks run detached on the main loop, so these errors are logged
/// and never returned to a caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Ready hook of '{class}' failed: {message}")]
pub struct RuntimeCallbackError {
    pub class: String,
    pub message: String,
}
