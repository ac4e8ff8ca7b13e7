//! Change notification for property setters.

use std::sync::Arc;

use horizon_trellis_core::{Accessor, CoreResult, Instance, Setter, Value};

pub use horizon_trellis_core::canonical_name;

/// Wrap `setter` so a successful write emits `notify::<property>`.
///
/// The property name is canonicalized once, when the wrapper is built.
pub fn notify_setter<F>(property: &str, setter: F) -> Setter
where
    F: Fn(&Instance, Value) -> CoreResult<()> + Send + Sync + 'static,
{
    let property = canonical_name(property);
    Arc::new(move |instance: &Instance, value: Value| {
        setter(instance, value)?;
        instance.notify(&property)
    })
}

/// Wrap the setter of `accessor` with [`notify_setter`].
///
/// An accessor without a setter is returned unchanged.
pub fn notify_accessor(property: &str, accessor: Accessor) -> Accessor {
    let Accessor { get, set } = accessor;
    let set = set.map(|set| notify_setter(property, move |instance, value| set(instance, value)));
    Accessor::from_parts(get, set)
}
