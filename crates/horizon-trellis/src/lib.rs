//! Horizon Trellis - declarative class augmentation for an object platform.
//!
//! A class is described as plain data: typed properties, template children,
//! actions and signals. Registration turns that description into a platform
//! class whose instances get validating accessors, capability-based action
//! wiring and a deferred `ready` hook. Three combinators work on any
//! instance: [`Debounce`], [`notify_setter`] and [`connect_async`].
//!
//! Declaring a class is a two-phase process:
//!
//! 1. [`Template`]: a base class and an ordered set of member descriptors
//! 2. [`ClassBuilder`]: the template plus class options, registered with a
//!    [`TypeRegistry`](horizon_trellis_core::TypeRegistry)
//!
//! # Example
//!
//! ```
//! use horizon_trellis::{
//!     ActionDescriptor, ClassBuilder, ConstructArgs, PropertyDescriptor, PropertyFlags, Template,
//! };
//! use horizon_trellis::platform::{Accessor, MainLoop, TypeRegistry, Value};
//!
//! let registry = TypeRegistry::new();
//! let template = Template::builder(&registry.widget_class())
//!     .property(
//!         "volume",
//!         PropertyDescriptor::double().with_range(0.0, 1.0).with_default(0.5),
//!     )
//!     .property(
//!         "channel",
//!         PropertyDescriptor::uint32().with_flags(PropertyFlags::ConstructOnly),
//!     )
//!     .action(
//!         "mute",
//!         ActionDescriptor::new().with_handler(|mixer, _| {
//!             mixer.set_property("volume", 0.0).unwrap();
//!         }),
//!     )
//!     .build();
//!
//! let mixer_class = ClassBuilder::new("Mixer", template)
//!     .accessor(
//!         "volume",
//!         Accessor::new(
//!             |mixer| mixer.stored_value("volume"),
//!             |mixer, value| mixer.store_value("volume", value),
//!         ),
//!     )
//!     .register(&registry)
//!     .unwrap();
//!
//! let main_loop = MainLoop::new();
//! let mixer = mixer_class
//!     .create_with(&main_loop, ConstructArgs::new().property("channel", 2u32))
//!     .unwrap();
//!
//! mixer.set_property("volume", 3.0).unwrap();
//! assert_eq!(mixer.property("volume").unwrap(), Value::Double(1.0));
//!
//! mixer.activate_action("Mixer.mute", None).unwrap();
//! assert_eq!(mixer.property("volume").unwrap(), Value::Double(0.0));
//! ```

pub mod accessor;
pub mod actions;
pub mod bridge;
pub mod class;
pub mod debounce;
pub mod descriptor;
mod error;
pub mod lifecycle;
pub mod logging;
pub mod notify;
pub mod template;

pub use accessor::{Validator, ValidatorTable, wrap_accessor};
pub use actions::{ActionTarget, widget_action_group};
pub use bridge::{BridgeError, connect_async};
pub use class::{ClassBuilder, ConstructArgs, InitFn, RegisteredClass};
pub use debounce::{Debounce, DebounceMode};
pub use descriptor::{
    ActionDescriptor, ActionHandler, ChildDescriptor, Descriptor, NumericBounds, NumericKind,
    PropertyDescriptor, PropertyFlags, PropertyKind, SignalDescriptor,
};
pub use error::{Error, Result, RuntimeCallbackError};
pub use lifecycle::{BoxError, ReadyHook, ReadyResult};
pub use notify::{canonical_name, notify_accessor, notify_setter};
pub use template::{Template, TemplateBuilder};

/// The object platform classes are registered with.
pub mod platform {
    pub use horizon_trellis_core::*;
}

static_assertions::assert_impl_all!(Template: Send, Sync, Clone);
static_assertions::assert_impl_all!(RegisteredClass: Send, Sync, Clone);
static_assertions::assert_impl_all!(Debounce<String>: Send, Sync, Clone);
