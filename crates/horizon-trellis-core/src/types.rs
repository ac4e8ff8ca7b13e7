//! Type registry: classes, enumerations and boxed types.
//!
//! Every instance belongs to a class registered here. A class is described
//! by a [`ClassInfo`] (name, parent, property specs, signals, children and
//! presentation metadata) and, once registered, is referred to through a
//! cheap [`ClassHandle`].
//!
//! A fresh registry already holds four built-in classes:
//!
//! | class | parent | capability |
//! |-------|--------|------------|
//! | `Object` | - | none |
//! | `Widget` | `Object` | [`Capability::Widget`] |
//! | `Window` | `Widget` | [`Capability::Window`] |
//! | `Application` | `Object` | [`Capability::Application`] |
//!
//! Capabilities are inherited, so a subclass of `Window` is a window.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::error::{CoreError, CoreResult};
use crate::logging::targets;
use crate::param::{ParamKind, ParamSpec, canonical_name, validate_name};
use crate::value::ValueKind;

/// The built-in capability a class inherits from its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Owns an application-wide action map and accelerator table.
    Application,
    /// Owns a window-level action map.
    Window,
    /// Can hold named action groups.
    Widget,
}

bitflags! {
    /// Flags applied to a registered class.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        /// The class cannot be instantiated.
        const ABSTRACT = 1 << 0;
        /// The class cannot be derived from.
        const FINAL = 1 << 1;
    }
}

bitflags! {
    /// Flags applied to a signal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SignalFlags: u32 {
        /// Class handler runs before user handlers.
        const RUN_FIRST = 1 << 0;
        /// Class handler runs after user handlers.
        const RUN_LAST = 1 << 1;
        /// Recursive emission restarts instead of nesting.
        const NO_RECURSE = 1 << 2;
        /// The signal accepts a `::detail` suffix.
        const DETAILED = 1 << 3;
        /// The signal may be emitted as an action.
        const ACTION = 1 << 4;
    }
}

/// How the return values of a signal's handlers are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Accumulator {
    /// The first handler's value is returned and emission stops.
    FirstWins,
    /// Emission stops at the first handler returning `true`.
    TrueHandled,
    /// The last handler's value is returned.
    #[default]
    Last,
}

/// Description of one signal of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    /// Canonical signal name.
    pub name: String,
    /// Signal flags.
    pub flags: SignalFlags,
    /// Kinds of the emission arguments.
    pub param_types: Vec<ValueKind>,
    /// Kind of the handlers' return value, `None` for no return value.
    pub return_type: Option<ValueKind>,
    /// How handler return values are combined.
    pub accumulator: Accumulator,
}

impl SignalSpec {
    /// A signal with no arguments, no return value and default flags.
    pub fn new(name: &str) -> Self {
        Self {
            name: canonical_name(name),
            flags: SignalFlags::RUN_LAST,
            param_types: Vec::new(),
            return_type: None,
            accumulator: Accumulator::default(),
        }
    }

    /// Set the signal flags.
    pub fn with_flags(mut self, flags: SignalFlags) -> Self {
        self.flags = flags;
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
        self.accumulator = accumulator;
        self
    }
}

/// Split a detailed signal name (`notify::label`) into name and detail.
pub fn split_detail(name: &str) -> (&str, Option<&str>) {
    match name.split_once("::") {
        Some((base, detail)) => (base, Some(detail)),
        None => (name, None),
    }
}

/// Everything the registry needs to register a class.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Registered type name.
    pub type_name: String,
    /// Parent class.
    pub parent: ClassHandle,
    /// Names of implemented capability interfaces.
    pub interfaces: Vec<String>,
    /// Property specs declared by this class.
    pub properties: Vec<ParamSpec>,
    /// Names of template children.
    pub children: Vec<String>,
    /// Signals declared by this class.
    pub signals: Vec<SignalSpec>,
    /// UI template resource path.
    pub template: Option<String>,
    /// Styling key.
    pub css_name: Option<String>,
    /// Type flags.
    pub flags: TypeFlags,
}

impl ClassInfo {
    /// An empty description of a class deriving from `parent`.
    pub fn new(type_name: impl Into<String>, parent: &ClassHandle) -> Self {
        Self {
            type_name: type_name.into(),
            parent: parent.clone(),
            interfaces: Vec::new(),
            properties: Vec::new(),
            children: Vec::new(),
            signals: Vec::new(),
            template: None,
            css_name: None,
            flags: TypeFlags::empty(),
        }
    }
}

struct ClassData {
    name: String,
    parent: Option<ClassHandle>,
    capability: Option<Capability>,
    flags: TypeFlags,
    interfaces: Vec<String>,
    properties: IndexMap<String, ParamSpec>,
    children: Vec<String>,
    signals: IndexMap<String, SignalSpec>,
    template: Option<String>,
    css_name: Option<String>,
    data: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

/// A handle to a registered class.
///
/// Handles compare by identity.
#[derive(Clone)]
pub struct ClassHandle {
    inner: Arc<ClassData>,
}

impl ClassHandle {
    /// The registered type name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The parent class, `None` for `Object`.
    pub fn parent(&self) -> Option<&ClassHandle> {
        self.inner.parent.as_ref()
    }

    /// The inherited capability.
    pub fn capability(&self) -> Option<Capability> {
        self.inner.capability
    }

    /// The type flags.
    pub fn flags(&self) -> TypeFlags {
        self.inner.flags
    }

    /// Whether the class cannot be instantiated.
    pub fn is_abstract(&self) -> bool {
        self.inner.flags.contains(TypeFlags::ABSTRACT)
    }

    /// Whether the class cannot be derived from.
    pub fn is_final(&self) -> bool {
        self.inner.flags.contains(TypeFlags::FINAL)
    }

    /// The UI template resource path.
    pub fn template_resource(&self) -> Option<&str> {
        self.inner.template.as_deref()
    }

    /// The styling key.
    pub fn css_name(&self) -> Option<&str> {
        self.inner.css_name.as_deref()
    }

    /// Whether both handles refer to the same class.
    pub fn ptr_eq(&self, other: &ClassHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Iterate over this class and its ancestors, most derived first.
    pub fn ancestry(&self) -> impl Iterator<Item = &ClassHandle> {
        std::iter::successors(Some(self), |class| class.parent())
    }

    /// Whether this class is `other` or derives from it.
    pub fn is_a(&self, other: &ClassHandle) -> bool {
        self.ancestry().any(|class| class.ptr_eq(other))
    }

    /// Look up a property on this class or an ancestor.
    pub fn find_property(&self, name: &str) -> Option<&ParamSpec> {
        let name = canonical_name(name);
        self.ancestry()
            .find_map(|class| class.inner.properties.get(&name))
    }

    /// Properties declared by this class itself, in declaration order.
    pub fn own_properties(&self) -> impl Iterator<Item = &ParamSpec> {
        self.inner.properties.values()
    }

    /// All properties, ancestors first.
    pub fn list_properties(&self) -> Vec<&ParamSpec> {
        let mut chain: Vec<&ClassHandle> = self.ancestry().collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|class| class.inner.properties.values())
            .collect()
    }

    /// Look up a signal by base name (without detail) on this class or an
    /// ancestor.
    pub fn find_signal(&self, name: &str) -> Option<&SignalSpec> {
        let name = canonical_name(name);
        self.ancestry().find_map(|class| class.inner.signals.get(&name))
    }

    /// Signals declared by this class itself.
    pub fn own_signals(&self) -> impl Iterator<Item = &SignalSpec> {
        self.inner.signals.values()
    }

    /// Template children declared by this class itself.
    pub fn children(&self) -> &[String] {
        &self.inner.children
    }

    /// Whether a template child of this name is declared along the chain.
    pub fn has_child(&self, name: &str) -> bool {
        self.ancestry()
            .any(|class| class.inner.children.iter().any(|child| child == name))
    }

    /// Interfaces declared by this class itself.
    pub fn interfaces(&self) -> &[String] {
        &self.inner.interfaces
    }

    /// Attach a value to this class under `key`, replacing any previous one.
    ///
    /// Class data is not inherited; walk [`ancestry`](Self::ancestry) to
    /// collect it along the chain.
    pub fn set_class_data<T: Any + Send + Sync>(&self, key: &str, value: Arc<T>) {
        self.inner.data.lock().insert(key.to_owned(), value);
    }

    /// The value attached to this class under `key`, if present and of type `T`.
    pub fn class_data<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let slot = self.inner.data.lock().get(key).cloned()?;
        slot.downcast::<T>().ok()
    }

    /// Whether this class or an ancestor implements `interface`.
    pub fn implements(&self, interface: &str) -> bool {
        self.ancestry()
            .any(|class| class.inner.interfaces.iter().any(|i| i == interface))
    }
}

impl PartialEq for ClassHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ClassHandle {}

impl fmt::Debug for ClassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassHandle").field(&self.inner.name).finish()
    }
}

struct EnumData {
    name: String,
    values: Vec<(i32, String)>,
}

/// A registered enumeration.
#[derive(Clone)]
pub struct EnumType {
    inner: Arc<EnumData>,
}

impl EnumType {
    /// The registered name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether `value` is one of the enumeration's values.
    pub fn contains(&self, value: i32) -> bool {
        self.inner.values.iter().any(|(v, _)| *v == value)
    }

    /// The nick of `value`.
    pub fn value_name(&self, value: i32) -> Option<&str> {
        self.inner
            .values
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, name)| name.as_str())
    }

    /// The value with nick `name`.
    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.inner
            .values
            .iter()
            .find(|(_, n)| n == name)
            .map(|(v, _)| *v)
    }

    /// All `(value, nick)` pairs in registration order.
    pub fn values(&self) -> &[(i32, String)] {
        &self.inner.values
    }
}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumType")
            .field("name", &self.inner.name)
            .field("values", &self.inner.values)
            .finish()
    }
}

#[derive(Default)]
struct RegistryState {
    classes: IndexMap<String, ClassHandle>,
    enums: IndexMap<String, EnumType>,
    boxed: HashSet<String>,
}

impl RegistryState {
    fn is_taken(&self, name: &str) -> bool {
        self.classes.contains_key(name) || self.enums.contains_key(name) || self.boxed.contains(name)
    }
}

struct Builtins {
    object: ClassHandle,
    widget: ClassHandle,
    window: ClassHandle,
    application: ClassHandle,
}

struct RegistryInner {
    state: RwLock<RegistryState>,
    builtins: Builtins,
}

/// The table of registered classes, enumerations and boxed types.
///
/// Cloning the handle is cheap; clones share the same table.
#[derive(Clone)]
pub struct TypeRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin(name: &str, parent: Option<&ClassHandle>, capability: Option<Capability>) -> ClassHandle {
    let mut signals = IndexMap::new();
    if parent.is_none() {
        let notify = SignalSpec::new("notify")
            .with_flags(SignalFlags::RUN_FIRST | SignalFlags::NO_RECURSE | SignalFlags::DETAILED)
            .with_param_types([ValueKind::String]);
        signals.insert(notify.name.clone(), notify);
    }
    ClassHandle {
        inner: Arc::new(ClassData {
            name: name.to_owned(),
            parent: parent.cloned(),
            capability,
            flags: TypeFlags::empty(),
            interfaces: Vec::new(),
            properties: IndexMap::new(),
            children: Vec::new(),
            signals,
            template: None,
            css_name: None,
            data: Mutex::default(),
        }),
    }
}

fn validate_type_name(name: &str) -> CoreResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
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

impl TypeRegistry {
    /// Create a registry holding only the built-in classes.
    pub fn new() -> Self {
        let object = builtin("Object", None, None);
        let widget = builtin("Widget", Some(&object), Some(Capability::Widget));
        let window = builtin("Window", Some(&widget), Some(Capability::Window));
        let application = builtin("Application", Some(&object), Some(Capability::Application));

        let mut state = RegistryState::default();
        for class in [&object, &widget, &window, &application] {
            state.classes.insert(class.name().to_owned(), class.clone());
        }

        Self {
            inner: Arc::new(RegistryInner {
                state: RwLock::new(state),
                builtins: Builtins {
                    object,
                    widget,
                    window,
                    application,
                },
            }),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TypeRegistry::new)
    }

    /// The built-in `Object` class.
    pub fn object_class(&self) -> ClassHandle {
        self.inner.builtins.object.clone()
    }

    /// The built-in `Widget` class.
    pub fn widget_class(&self) -> ClassHandle {
        self.inner.builtins.widget.clone()
    }

    /// The built-in `Window` class.
    pub fn window_class(&self) -> ClassHandle {
        self.inner.builtins.window.clone()
    }

    /// The built-in `Application` class.
    pub fn application_class(&self) -> ClassHandle {
        self.inner.builtins.application.clone()
    }

    /// Look up a class by name.
    pub fn lookup(&self, name: &str) -> Option<ClassHandle> {
        self.inner.state.read().classes.get(name).cloned()
    }

    /// Whether `class` was registered with this registry.
    pub fn owns(&self, class: &ClassHandle) -> bool {
        self.lookup(class.name())
            .is_some_and(|registered| registered.ptr_eq(class))
    }

    /// Number of registered classes, built-ins included.
    pub fn class_count(&self) -> usize {
        self.inner.state.read().classes.len()
    }

    /// All registered classes in registration order.
    pub fn classes(&self) -> Vec<ClassHandle> {
        self.inner.state.read().classes.values().cloned().collect()
    }

    /// Register an enumeration.
    pub fn register_enum(&self, name: &str, values: &[(i32, &str)]) -> CoreResult<EnumType> {
        validate_type_name(name)?;
        let mut state = self.inner.state.write();
        if state.is_taken(name) {
            return Err(CoreError::DuplicateType {
                name: name.to_owned(),
            });
        }
        let enum_type = EnumType {
            inner: Arc::new(EnumData {
                name: name.to_owned(),
                values: values.iter().map(|(v, n)| (*v, (*n).to_owned())).collect(),
            }),
        };
        state.enums.insert(name.to_owned(), enum_type.clone());
        tracing::debug!(target: targets::TYPES, name, "registered enum");
        Ok(enum_type)
    }

    /// Look up an enumeration by name.
    pub fn enum_type(&self, name: &str) -> Option<EnumType> {
        self.inner.state.read().enums.get(name).cloned()
    }

    /// Register an opaque boxed type name.
    pub fn register_boxed(&self, name: &str) -> CoreResult<()> {
        validate_type_name(name)?;
        let mut state = self.inner.state.write();
        if state.is_taken(name) {
            return Err(CoreError::DuplicateType {
                name: name.to_owned(),
            });
        }
        state.boxed.insert(name.to_owned());
        tracing::debug!(target: targets::TYPES, name, "registered boxed type");
        Ok(())
    }

    /// Whether a boxed type of this name is registered.
    pub fn has_boxed(&self, name: &str) -> bool {
        self.inner.state.read().boxed.contains(name)
    }

    /// Register a class.
    ///
    /// Fails if the name is invalid or taken, the parent is final or not
    /// registered here, a property or signal is declared twice along the
    /// chain, or a property refers to an unregistered type.
    pub fn register(&self, info: ClassInfo) -> CoreResult<ClassHandle> {
        validate_type_name(&info.type_name)?;

        let mut state = self.inner.state.write();
        if state.is_taken(&info.type_name) {
            return Err(CoreError::DuplicateType {
                name: info.type_name,
            });
        }
        let parent_registered = state
            .classes
            .get(info.parent.name())
            .is_some_and(|registered| registered.ptr_eq(&info.parent));
        if !parent_registered {
            return Err(CoreError::UnknownType {
                name: info.parent.name().to_owned(),
            });
        }
        if info.parent.is_final() {
            return Err(CoreError::FinalParent {
                parent: info.parent.name().to_owned(),
            });
        }

        let mut properties = IndexMap::with_capacity(info.properties.len());
        for spec in info.properties {
            if properties.contains_key(spec.name()) || info.parent.find_property(spec.name()).is_some() {
                return Err(CoreError::DuplicateProperty {
                    class: info.type_name,
                    property: spec.name().to_owned(),
                });
            }
            match spec.kind() {
                ParamKind::Boxed { type_name } if !state.boxed.contains(type_name) => {
                    return Err(CoreError::UnknownType {
                        name: type_name.clone(),
                    });
                }
                ParamKind::Enum { enum_type, .. } if !state.enums.contains_key(enum_type.name()) => {
                    return Err(CoreError::UnknownType {
                        name: enum_type.name().to_owned(),
                    });
                }
                ParamKind::Object { object_type } if !state.classes.contains_key(object_type.name()) => {
                    return Err(CoreError::UnknownType {
                        name: object_type.name().to_owned(),
                    });
                }
                _ => {}
            }
            properties.insert(spec.name().to_owned(), spec);
        }

        let mut signals = IndexMap::with_capacity(info.signals.len());
        for mut signal in info.signals {
            signal.name = canonical_name(&signal.name);
            validate_name(&signal.name)?;
            if signals.contains_key(&signal.name) || info.parent.find_signal(&signal.name).is_some() {
                return Err(CoreError::DuplicateSignal {
                    class: info.type_name,
                    signal: signal.name,
                });
            }
            signals.insert(signal.name.clone(), signal);
        }

        let class = ClassHandle {
            inner: Arc::new(ClassData {
                capability: info.parent.capability(),
                parent: Some(info.parent),
                name: info.type_name.clone(),
                flags: info.flags,
                interfaces: info.interfaces,
                properties,
                children: info.children,
                signals,
                template: info.template,
                css_name: info.css_name,
                data: Mutex::default(),
            }),
        };
        state.classes.insert(info.type_name, class.clone());

        tracing::debug!(
            target: targets::TYPES,
            class = class.name(),
            parent = class.parent().map(ClassHandle::name),
            properties = class.inner.properties.len(),
            signals = class.inner.signals.len(),
            "registered class"
        );
        Ok(class)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("TypeRegistry")
            .field("classes", &state.classes.keys().collect::<Vec<_>>())
            .field("enums", &state.enums.keys().collect::<Vec<_>>())
            .finish()
    }
}

static_assertions::assert_impl_all!(TypeRegistry: Send, Sync);
static_assertions::assert_impl_all!(ClassHandle: Send, Sync);
