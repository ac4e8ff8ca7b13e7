//! Object platform for Horizon Trellis.
//!
//! This crate provides the runtime that declarative classes are registered
//! with and instantiated on:
//!
//! - **Values**: dynamically typed [`Value`]s carried by properties, signals
//!   and actions
//! - **Property specs**: [`ParamSpec`] constructors per value kind, with
//!   bounds, defaults and access flags
//! - **Type registry**: classes with capabilities, enumerations and boxed
//!   types
//! - **Instances**: properties, named signals, data slots, template children
//!   and action groups
//! - **Actions**: [`SimpleAction`], [`ActionGroup`] and the [`ActionMap`]
//!   trait
//! - **Main loop**: a cooperative scheduler with idle callbacks, timeouts and
//!   local futures on a virtual clock
//!
//! # Example
//!
//! ```
//! use horizon_trellis_core::{
//!     ClassInfo, Instance, MainLoop, ParamFlags, ParamSpec, TypeRegistry, Value,
//! };
//!
//! let registry = TypeRegistry::new();
//! let mut info = ClassInfo::new("Counter", &registry.object_class());
//! info.properties
//!     .push(ParamSpec::int("count", "Count", "", ParamFlags::READWRITE, 0, 10, 0).unwrap());
//! let class = registry.register(info).unwrap();
//!
//! let main_loop = MainLoop::new();
//! let counter = Instance::new(&class, &main_loop).unwrap();
//! counter.set_property("count", 3).unwrap();
//! assert_eq!(counter.property("count").unwrap(), Value::Int(3));
//! ```

pub mod action;
mod error;
pub mod instance;
pub mod logging;
pub mod main_loop;
pub mod param;
pub mod signal;
pub mod types;
mod value;

pub use action::{ActionGroup, ActionMap, SimpleAction};
pub use error::{CoreError, CoreResult};
pub use instance::{Accessor, Getter, HandlerId, Instance, Setter, WeakInstance};
pub use logging::{ClassTreeDebug, TreeFormatOptions, TreeStyle};
pub use main_loop::{MainLoop, MainLoopConfig, SourceId};
pub use param::{ParamFlags, ParamKind, ParamSpec, canonical_name};
pub use signal::{ConnectionId, Signal};
pub use types::{
    Accumulator, Capability, ClassHandle, ClassInfo, EnumType, SignalFlags, SignalSpec,
    TypeFlags, TypeRegistry, split_detail,
};
pub use value::{Value, ValueKind};
