//! Write validation and accessor wrapping.
//!
//! Every declared property gets a [`Validator`] when it is added to a
//! template or class builder. Validators enforce the numeric policy on every
//! write: integer kinds are truncated toward zero and then clamped to the
//! declared range, doubles are clamped only. Other kinds are type-checked.
//! Once the class is registered, each validator is chained with the platform
//! conversion of the resolved spec, which checks object types and enum
//! membership.
//!
//! At instantiation each writable, non-construct-only property must be
//! backed by an [`Accessor`] pair, found on the class first and then on the
//! instance. The pair is replaced by a wrapper that validates before
//! delegating to the original setter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use horizon_trellis_core::{
    Accessor, CoreError, CoreResult, Getter, Instance, ParamSpec, Setter, Value, ValueKind,
    canonical_name,
};
use indexmap::IndexMap;

use crate::descriptor::{NumericBounds, PropertyDescriptor};
use crate::error::{Error, Result};

type CheckFn = Arc<dyn Fn(Value) -> CoreResult<Value> + Send + Sync>;

/// Validation closure for writes to one property.
#[derive(Clone)]
pub struct Validator {
    property: String,
    check: CheckFn,
}

fn mismatch(property: &str, expected: ValueKind, got: ValueKind) -> CoreError {
    CoreError::TypeMismatch {
        property: property.to_owned(),
        expected,
        got,
    }
}

fn numeric_check(property: String, kind: ValueKind, bounds: NumericBounds) -> CheckFn {
    Arc::new(move |value: Value| {
        let number = value
            .as_f64()
            .ok_or_else(|| mismatch(&property, kind, value.kind()))?;
        if number.is_nan() {
            return Err(CoreError::InvalidValue {
                property: property.clone(),
                message: "NaN is not a valid number".into(),
            });
        }
        let constrained = bounds.apply(number, kind != ValueKind::Double);
        Ok(match kind {
            ValueKind::Int => Value::Int(constrained as i32),
            ValueKind::UInt => Value::UInt(constrained as u32),
            _ => Value::Double(constrained),
        })
    })
}

impl Validator {
    /// Build the validator for the property declared as `name`.
    pub fn for_property(name: &str, descriptor: &PropertyDescriptor) -> Self {
        let property = canonical_name(name);
        let kind = descriptor.kind().value_kind();
        let check: CheckFn = match descriptor.bounds() {
            Some(bounds) => numeric_check(property.clone(), kind, bounds),
            None => {
                let property = property.clone();
                Arc::new(move |value: Value| match (kind, value) {
                    (ValueKind::Enum, Value::Enum(raw) | Value::Int(raw)) => Ok(Value::Enum(raw)),
                    (kind, value) if value.kind() == kind => Ok(value),
                    (kind, value) => Err(mismatch(&property, kind, value.kind())),
                })
            }
        };
        Self { property, check }
    }

    /// A validator that only converts through the platform spec.
    pub fn from_spec(spec: &ParamSpec) -> Self {
        let spec = spec.clone();
        Self {
            property: spec.name().to_owned(),
            check: Arc::new(move |value| spec.convert(value)),
        }
    }

    /// Follow this validator with the platform conversion of `spec`.
    ///
    /// The descriptor check coerces and clamps; the spec then enforces what
    /// only the registry knows, such as the declared object type or the
    /// members of an enumeration.
    pub fn then_convert(self, spec: &ParamSpec) -> Self {
        let spec = spec.clone();
        let check = self.check;
        Self {
            property: self.property,
            check: Arc::new(move |value| spec.convert(check(value)?)),
        }
    }

    /// The canonical property name.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Validate and coerce a value about to be written.
    pub fn validate(&self, value: Value) -> CoreResult<Value> {
        (self.check)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("property", &self.property)
            .finish_non_exhaustive()
    }
}

/// Validators keyed by canonical property name.
#[derive(Debug, Clone, Default)]
pub struct ValidatorTable {
    validators: IndexMap<String, Validator>,
}

impl ValidatorTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and insert the validator for `name`, replacing any previous one.
    pub fn insert(&mut self, name: &str, descriptor: &PropertyDescriptor) {
        let validator = Validator::for_property(name, descriptor);
        self.validators
            .insert(validator.property.clone(), validator);
    }

    /// The validator for a property.
    pub fn get(&self, name: &str) -> Option<&Validator> {
        self.validators.get(&canonical_name(name))
    }

    /// Merge `other` into this table; entries of `other` win.
    pub fn extend(&mut self, other: &ValidatorTable) {
        for (name, validator) in &other.validators {
            self.validators.insert(name.clone(), validator.clone());
        }
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

/// Wrap `original` so reads fall back to `default` and writes are validated.
pub fn wrap_accessor(original: Accessor, validator: Validator, default: Value) -> Accessor {
    let Accessor { get, set } = original;

    let getter: Getter = Arc::new(move |instance: &Instance| {
        get.as_ref()
            .and_then(|get| get(instance))
            .or_else(|| Some(default.clone()))
    });
    let setter: Setter = Arc::new(move |instance: &Instance, value: Value| {
        let value = validator.validate(value)?;
        match &set {
            Some(set) => set(instance, value),
            None => Ok(()),
        }
    });
    Accessor::from_parts(Some(getter), Some(setter))
}

/// Install validating accessors on a freshly initialized instance.
///
/// Every writable, non-construct-only property needs a complete accessor
/// pair in `class_accessors` or, failing that, on the instance.
pub(crate) fn install_accessors<'a>(
    instance: &Instance,
    class: &str,
    properties: impl IntoIterator<Item = (&'a ParamSpec, &'a Validator)>,
    class_accessors: &HashMap<String, Accessor>,
) -> Result<()> {
    for (spec, validator) in properties {
        if !spec.is_writable() || spec.is_construct_only() {
            continue;
        }
        let name = spec.name();
        let original = class_accessors
            .get(name)
            .filter(|accessor| accessor.is_complete())
            .cloned()
            .or_else(|| instance.accessor(name).filter(Accessor::is_complete))
            .ok_or_else(|| Error::accessor_contract(class, name))?;

        instance.define_accessor(
            name,
            wrap_accessor(original, validator.clone(), spec.default_value()),
        );
    }
    Ok(())
}
