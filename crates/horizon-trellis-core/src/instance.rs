//! Instances of registered classes.
//!
//! An [`Instance`] is a reference-counted handle to one object. It carries:
//!
//! - **Properties**: read and written by name through [`Instance::property`]
//!   and [`Instance::set_property`], honouring the flags of the class's
//!   [`ParamSpec`]s. A per-instance [`Accessor`] can take over storage.
//! - **Named signals**: connected and emitted by name, checked against the
//!   class's [`SignalSpec`](crate::SignalSpec)s. Detailed signals accept a
//!   `::detail` suffix (`notify::label`).
//! - **Data slots**: arbitrary typed values keyed by string.
//! - **Template children**, **bound actions**, **action groups** and, for
//!   applications, **accelerators**.
//!
//! No user callback (accessor, handler) runs while the instance's lock is
//! held, so callbacks may freely reenter the instance.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::action::{ActionGroup, ActionMap, SimpleAction};
use crate::error::{CoreError, CoreResult};
use crate::logging::targets;
use crate::main_loop::MainLoop;
use crate::param::{ParamSpec, canonical_name};
use crate::signal::{ConnectionId, Signal};
use crate::types::{Accumulator, Capability, ClassHandle, SignalFlags, SignalSpec, split_detail};
use crate::value::Value;

new_key_type! {
    /// A unique identifier for a handler connected to a named signal.
    pub struct HandlerId;
}

/// Reads a property. `None` defers to the stored value or the default.
pub type Getter = Arc<dyn Fn(&Instance) -> Option<Value> + Send + Sync>;

/// Writes a property.
pub type Setter = Arc<dyn Fn(&Instance, Value) -> CoreResult<()> + Send + Sync>;

type NamedSignal = Signal<Vec<Value>, Option<Value>>;

/// A getter/setter pair taking over a property's storage.
#[derive(Clone, Default)]
pub struct Accessor {
    /// The getter, if any.
    pub get: Option<Getter>,
    /// The setter, if any.
    pub set: Option<Setter>,
}

impl Accessor {
    /// A pair from an infallible getter and setter.
    pub fn new<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&Instance) -> Option<Value> + Send + Sync + 'static,
        S: Fn(&Instance, Value) + Send + Sync + 'static,
    {
        let setter: Setter = Arc::new(move |instance: &Instance, value: Value| -> CoreResult<()> {
            set(instance, value);
            Ok(())
        });
        Self {
            get: Some(Arc::new(get)),
            set: Some(setter),
        }
    }

    /// A pair from raw parts.
    pub fn from_parts(get: Option<Getter>, set: Option<Setter>) -> Self {
        Self { get, set }
    }

    /// Whether both a getter and a setter are present.
    pub fn is_complete(&self) -> bool {
        self.get.is_some() && self.set.is_some()
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

#[derive(Default)]
struct InstanceState {
    values: HashMap<String, Value>,
    accessors: HashMap<String, Accessor>,
    signals: HashMap<String, Arc<NamedSignal>>,
    handlers: SlotMap<HandlerId, (String, ConnectionId)>,
    data: HashMap<String, Arc<dyn Any + Send + Sync>>,
    children: IndexMap<String, Instance>,
    actions: IndexMap<String, SimpleAction>,
    action_groups: IndexMap<String, ActionGroup>,
    accels: IndexMap<String, Vec<String>>,
}

struct InstanceInner {
    id: u64,
    class: ClassHandle,
    main_loop: MainLoop,
    constructed: AtomicBool,
    own_actions: Option<ActionGroup>,
    state: Mutex<InstanceState>,
}

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// A handle to an instance of a registered class.
///
/// Cloning the handle is cheap; handles compare by identity.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

/// A weak handle to an [`Instance`].
#[derive(Clone, Default)]
pub struct WeakInstance {
    inner: Weak<InstanceInner>,
}

impl WeakInstance {
    /// The instance, if it is still alive.
    pub fn upgrade(&self) -> Option<Instance> {
        self.inner.upgrade().map(|inner| Instance { inner })
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(instance) => write!(f, "WeakInstance({instance:?})"),
            None => f.write_str("WeakInstance(<dropped>)"),
        }
    }
}

fn stop_emission(accumulator: Accumulator, result: &Option<Value>) -> bool {
    match accumulator {
        Accumulator::FirstWins => true,
        Accumulator::TrueHandled => matches!(result, Some(Value::Bool(true))),
        Accumulator::Last => false,
    }
}

impl Instance {
    /// Create an instance of `class` driven by `main_loop`.
    ///
    /// The instance starts in the construction phase, during which
    /// construct-only properties may be written. Call
    /// [`finish_construction`](Self::finish_construction) to seal it.
    pub fn new(class: &ClassHandle, main_loop: &MainLoop) -> CoreResult<Self> {
        if class.is_abstract() {
            return Err(CoreError::AbstractType {
                name: class.name().to_owned(),
            });
        }
        let own_actions = match class.capability() {
            Some(Capability::Application | Capability::Window) => Some(ActionGroup::new()),
            _ => None,
        };
        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(target: targets::OBJECT, class = class.name(), id, "instance created");
        Ok(Self {
            inner: Arc::new(InstanceInner {
                id,
                class: class.clone(),
                main_loop: main_loop.clone(),
                constructed: AtomicBool::new(false),
                own_actions,
                state: Mutex::new(InstanceState::default()),
            }),
        })
    }

    /// Seal construction; construct-only properties reject writes afterwards.
    pub fn finish_construction(&self) {
        self.inner.constructed.store(true, Ordering::Release);
    }

    /// Whether construction has been sealed.
    pub fn is_constructed(&self) -> bool {
        self.inner.constructed.load(Ordering::Acquire)
    }

    /// A process-unique id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A weak handle to this instance.
    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The class of this instance.
    pub fn class(&self) -> &ClassHandle {
        &self.inner.class
    }

    /// The registered type name of the class.
    pub fn type_name(&self) -> &str {
        self.inner.class.name()
    }

    /// The main loop driving this instance.
    pub fn main_loop(&self) -> &MainLoop {
        &self.inner.main_loop
    }

    /// The capability inherited from the class's base.
    pub fn capability(&self) -> Option<Capability> {
        self.inner.class.capability()
    }

    /// Whether this instance is an application.
    pub fn is_application(&self) -> bool {
        self.capability() == Some(Capability::Application)
    }

    /// Whether this instance is a window.
    pub fn is_window(&self) -> bool {
        self.capability() == Some(Capability::Window)
    }

    /// Whether this instance is a widget. Windows are widgets too.
    pub fn is_widget(&self) -> bool {
        matches!(
            self.capability(),
            Some(Capability::Widget | Capability::Window)
        )
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    fn find_spec(&self, name: &str) -> CoreResult<&ParamSpec> {
        self.inner
            .class
            .find_property(name)
            .ok_or_else(|| CoreError::PropertyNotFound {
                class: self.type_name().to_owned(),
                property: canonical_name(name),
            })
    }

    /// Read a property.
    pub fn property(&self, name: &str) -> CoreResult<Value> {
        let spec = self.find_spec(name)?;
        if !spec.is_readable() {
            return Err(CoreError::PropertyNotReadable {
                class: self.type_name().to_owned(),
                property: spec.name().to_owned(),
            });
        }

        let getter = self
            .inner
            .state
            .lock()
            .accessors
            .get(spec.name())
            .and_then(|accessor| accessor.get.clone());
        if let Some(value) = getter.and_then(|get| get(self)) {
            return Ok(value);
        }
        Ok(self
            .stored_value(spec.name())
            .unwrap_or_else(|| spec.default_value()))
    }

    /// Write a property.
    ///
    /// Fails if the property is read-only, or construct-only and the instance
    /// is constructed. Without an accessor the value is converted to the
    /// property's kind and stored. Writing does not emit `notify`.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> CoreResult<()> {
        let spec = self.find_spec(name)?;
        if !spec.is_writable() {
            return Err(CoreError::PropertyReadOnly {
                class: self.type_name().to_owned(),
                property: spec.name().to_owned(),
            });
        }
        if spec.is_construct_only() && self.is_constructed() {
            return Err(CoreError::ConstructOnly {
                class: self.type_name().to_owned(),
                property: spec.name().to_owned(),
            });
        }

        let setter = self
            .inner
            .state
            .lock()
            .accessors
            .get(spec.name())
            .and_then(|accessor| accessor.set.clone());
        match setter {
            Some(set) => set(self, value.into()),
            None => {
                let value = spec.convert(value.into())?;
                self.store_value(spec.name(), value);
                Ok(())
            }
        }
    }

    /// The raw stored value of a property, bypassing accessors.
    pub fn stored_value(&self, name: &str) -> Option<Value> {
        self.inner
            .state
            .lock()
            .values
            .get(&canonical_name(name))
            .cloned()
    }

    /// Store a raw property value, bypassing accessors and flags.
    pub fn store_value(&self, name: &str, value: Value) {
        self.inner
            .state
            .lock()
            .values
            .insert(canonical_name(name), value);
    }

    /// Install an accessor pair for a property on this instance.
    pub fn define_accessor(&self, name: &str, accessor: Accessor) {
        self.inner
            .state
            .lock()
            .accessors
            .insert(canonical_name(name), accessor);
    }

    /// The accessor pair installed for a property.
    pub fn accessor(&self, name: &str) -> Option<Accessor> {
        self.inner
            .state
            .lock()
            .accessors
            .get(&canonical_name(name))
            .cloned()
    }

    // -------------------------------------------------------------------------
    // Signals
    // -------------------------------------------------------------------------

    /// Resolve a (possibly detailed) signal name to its spec and handler key.
    fn resolve_signal(&self, name: &str) -> CoreResult<(&SignalSpec, String)> {
        let (base, detail) = split_detail(name);
        let not_found = || CoreError::SignalNotFound {
            class: self.type_name().to_owned(),
            signal: name.to_owned(),
        };
        let spec = self.inner.class.find_signal(base).ok_or_else(not_found)?;
        let key = match detail {
            Some(_) if !spec.flags.contains(SignalFlags::DETAILED) => return Err(not_found()),
            Some(detail) => format!("{}::{}", spec.name, canonical_name(detail)),
            None => spec.name.clone(),
        };
        Ok((spec, key))
    }

    /// Connect a handler to a named signal.
    pub fn connect<F>(&self, name: &str, handler: F) -> CoreResult<HandlerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.connect_with_return(name, move |args| {
            handler(args);
            None
        })
    }

    /// Connect a handler whose return value feeds the signal's accumulator.
    pub fn connect_with_return<F>(&self, name: &str, handler: F) -> CoreResult<HandlerId>
    where
        F: Fn(&[Value]) -> Option<Value> + Send + Sync + 'static,
    {
        let (_, key) = self.resolve_signal(name)?;
        let mut state = self.inner.state.lock();
        let signal = state
            .signals
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Signal::new()))
            .clone();
        let connection = signal.connect(move |args: &Vec<Value>| handler(args));
        let id = state.handlers.insert((key, connection));
        tracing::trace!(target: targets::OBJECT, signal = name, ?id, "handler connected");
        Ok(id)
    }

    /// Disconnect a handler.
    pub fn disconnect(&self, id: HandlerId) -> CoreResult<()> {
        let mut state = self.inner.state.lock();
        let (key, connection) = state
            .handlers
            .remove(id)
            .ok_or(CoreError::HandlerNotFound)?;
        if let Some(signal) = state.signals.get(&key) {
            signal.disconnect(connection);
        }
        Ok(())
    }

    /// Whether a handler is still connected.
    pub fn is_connected(&self, id: HandlerId) -> bool {
        self.inner.state.lock().handlers.contains_key(id)
    }

    /// Number of handlers connected to a signal.
    ///
    /// For a plain name this counts detailed handlers too; for a detailed
    /// name only handlers of that detail.
    pub fn handler_count(&self, name: &str) -> usize {
        let Ok((_, key)) = self.resolve_signal(name) else {
            return 0;
        };
        let detailed_prefix = format!("{key}::");
        let has_detail = split_detail(name).1.is_some();
        self.inner
            .state
            .lock()
            .handlers
            .values()
            .filter(|(handler_key, _)| {
                *handler_key == key || (!has_detail && handler_key.starts_with(&detailed_prefix))
            })
            .count()
    }

    /// Emit a named signal.
    ///
    /// Arguments must match the signal's parameter kinds. Handlers of the
    /// detailed name run before handlers of the plain name, each group in
    /// connection order. The return value is combined by the signal's
    /// accumulator.
    pub fn emit(&self, name: &str, args: Vec<Value>) -> CoreResult<Option<Value>> {
        let (spec, key) = self.resolve_signal(name)?;
        if args.len() != spec.param_types.len() {
            return Err(CoreError::ArgumentMismatch {
                signal: name.to_owned(),
                message: format!(
                    "expected {} arguments, got {}",
                    spec.param_types.len(),
                    args.len()
                ),
            });
        }
        if let Some((index, (arg, kind))) = args
            .iter()
            .zip(&spec.param_types)
            .enumerate()
            .find(|(_, (arg, kind))| arg.kind() != **kind)
        {
            return Err(CoreError::ArgumentMismatch {
                signal: name.to_owned(),
                message: format!("argument {index} should be {kind}, got {}", arg.kind()),
            });
        }

        let signals: Vec<Arc<NamedSignal>> = {
            let state = self.inner.state.lock();
            let detailed = (key != spec.name).then(|| state.signals.get(&key).cloned());
            detailed
                .flatten()
                .into_iter()
                .chain(state.signals.get(&spec.name).cloned())
                .collect()
        };

        tracing::trace!(target: targets::OBJECT, class = self.type_name(), signal = name, "emit");
        let accumulator = spec.accumulator;
        let mut result = None;
        for signal in signals {
            let values = signal.emit_until(args.clone(), |r| stop_emission(accumulator, r));
            if let Some(last) = values.into_iter().last() {
                let stop = stop_emission(accumulator, &last);
                result = last;
                if stop {
                    break;
                }
            }
        }
        Ok(result)
    }

    /// Emit `notify::<property>` for a property of this instance.
    pub fn notify(&self, property: &str) -> CoreResult<()> {
        let spec = self.find_spec(property)?;
        let name = spec.name().to_owned();
        self.emit(&format!("notify::{name}"), vec![Value::String(name)])?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Data slots
    // -------------------------------------------------------------------------

    /// Store a value in a data slot, replacing any previous value.
    pub fn set_data<T: Any + Send + Sync>(&self, key: &str, value: T) {
        self.inner
            .state
            .lock()
            .data
            .insert(key.to_owned(), Arc::new(value));
    }

    /// The value in a data slot, if present and of type `T`.
    pub fn data<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let slot = self.inner.state.lock().data.get(key).cloned()?;
        slot.downcast::<T>().ok()
    }

    /// The value in a data slot, creating it with `init` if absent.
    ///
    /// `init` runs without the instance lock held; if another caller fills
    /// the slot first, its value wins.
    pub fn data_or_insert_with<T, F>(&self, key: &str, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.data::<T>(key) {
            return existing;
        }
        let created: Arc<T> = Arc::new(init());
        let erased: Arc<dyn Any + Send + Sync> = created.clone();
        let mut state = self.inner.state.lock();
        let slot = state
            .data
            .entry(key.to_owned())
            .or_insert_with(|| erased.clone());
        match slot.clone().downcast::<T>() {
            Ok(existing) => existing,
            Err(_) => {
                *slot = erased;
                created
            }
        }
    }

    /// Remove a value from a data slot, returning it if of type `T`.
    pub fn steal_data<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let slot = self.inner.state.lock().data.remove(key)?;
        slot.downcast::<T>().ok()
    }

    /// Whether a data slot is occupied.
    pub fn has_data(&self, key: &str) -> bool {
        self.inner.state.lock().data.contains_key(key)
    }

    // -------------------------------------------------------------------------
    // Template children
    // -------------------------------------------------------------------------

    /// Bind a template child by name.
    pub fn bind_child(&self, name: &str, child: Instance) {
        self.inner
            .state
            .lock()
            .children
            .insert(name.to_owned(), child);
    }

    /// A bound template child.
    pub fn child(&self, name: &str) -> Option<Instance> {
        self.inner.state.lock().children.get(name).cloned()
    }

    /// Names of the bound template children, in binding order.
    pub fn child_names(&self) -> Vec<String> {
        self.inner.state.lock().children.keys().cloned().collect()
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// The built-in action map of an application or window.
    pub fn action_map(&self) -> Option<ActionGroup> {
        self.inner.own_actions.clone()
    }

    /// Bind an action to this instance under a member name.
    pub fn bind_action(&self, name: &str, action: SimpleAction) {
        self.inner
            .state
            .lock()
            .actions
            .insert(name.to_owned(), action);
    }

    /// An action bound under a member name.
    pub fn action(&self, name: &str) -> Option<SimpleAction> {
        self.inner.state.lock().actions.get(name).cloned()
    }

    /// Insert an action group under `prefix`, or remove it with `None`.
    pub fn insert_action_group(&self, prefix: &str, group: Option<ActionGroup>) {
        let mut state = self.inner.state.lock();
        match group {
            Some(group) => {
                state.action_groups.insert(prefix.to_owned(), group);
            }
            None => {
                state.action_groups.shift_remove(prefix);
            }
        }
    }

    /// The action group inserted under `prefix`.
    pub fn action_group(&self, prefix: &str) -> Option<ActionGroup> {
        self.inner.state.lock().action_groups.get(prefix).cloned()
    }

    /// Prefixes of the inserted action groups.
    pub fn action_prefixes(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .action_groups
            .keys()
            .cloned()
            .collect()
    }

    /// Activate an action by detailed name (`<prefix>.<action>`).
    ///
    /// `app.` addresses an application's own map and `win.` a window's.
    pub fn activate_action(&self, detailed: &str, parameter: Option<Value>) -> CoreResult<()> {
        let not_found = || CoreError::ActionNotFound {
            name: detailed.to_owned(),
        };
        let (prefix, name) = detailed.split_once('.').ok_or_else(not_found)?;
        let group = match prefix {
            "app" if self.is_application() => self.action_map(),
            "win" if self.is_window() => self.action_map(),
            _ => self.action_group(prefix),
        };
        let action = group
            .and_then(|group| group.lookup_action(name))
            .ok_or_else(not_found)?;
        action.activate(parameter)
    }

    // -------------------------------------------------------------------------
    // Accelerators
    // -------------------------------------------------------------------------

    /// Set the accelerators of a detailed action name. Applications only.
    ///
    /// An empty list removes the entry.
    pub fn set_accels_for_action(&self, detailed: &str, accels: &[&str]) -> CoreResult<()> {
        if !self.is_application() {
            return Err(CoreError::NotAnApplication {
                class: self.type_name().to_owned(),
            });
        }
        let mut state = self.inner.state.lock();
        if accels.is_empty() {
            state.accels.shift_remove(detailed);
        } else {
            state.accels.insert(
                detailed.to_owned(),
                accels.iter().map(|accel| (*accel).to_owned()).collect(),
            );
        }
        Ok(())
    }

    /// The accelerators of a detailed action name.
    pub fn accels_for_action(&self, detailed: &str) -> Vec<String> {
        self.inner
            .state
            .lock()
            .accels
            .get(detailed)
            .cloned()
            .unwrap_or_default()
    }

    /// Detailed action names triggered by `accel`.
    pub fn actions_for_accel(&self, accel: &str) -> Vec<String> {
        self.inner
            .state
            .lock()
            .accels
            .iter()
            .filter(|(_, accels)| accels.iter().any(|a| a == accel))
            .map(|(detailed, _)| detailed.clone())
            .collect()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Instance {}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .field("id", &self.inner.id)
            .finish()
    }
}

static_assertions::assert_impl_all!(Instance: Send, Sync);
static_assertions::assert_impl_all!(Value: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamFlags;
    use crate::types::{ClassInfo, TypeRegistry};
    use crate::value::ValueKind;
    use std::sync::atomic::AtomicUsize;

    fn counter_class(registry: &TypeRegistry) -> ClassHandle {
        let mut info = ClassInfo::new("Counter", &registry.object_class());
        info.properties.extend([
            ParamSpec::int("count", "", "", ParamFlags::READWRITE, 0, 100, 5).unwrap(),
            ParamSpec::string("label", "", "", ParamFlags::READABLE, Some("fixed")).unwrap(),
            ParamSpec::boolean(
                "sealed",
                "",
                "",
                ParamFlags::READWRITE | ParamFlags::CONSTRUCT_ONLY,
                false,
            )
            .unwrap(),
        ]);
        info.signals.extend([
            SignalSpec::new("changed").with_param_types([ValueKind::Int]),
            SignalSpec::new("close-request")
                .with_return_type(ValueKind::Bool)
                .with_accumulator(Accumulator::TrueHandled),
        ]);
        registry.register(info).unwrap()
    }

    #[test]
    fn test_property_defaults_and_storage() {
        let registry = TypeRegistry::new();
        let instance = Instance::new(&counter_class(&registry), &MainLoop::new()).unwrap();

        assert_eq!(instance.property("count").unwrap(), Value::Int(5));
        instance.set_property("count", 9).unwrap();
        assert_eq!(instance.property("count").unwrap(), Value::Int(9));
        assert_eq!(instance.property("label").unwrap(), Value::from("fixed"));
    }

    #[test]
    fn test_property_flag_checks() {
        let registry = TypeRegistry::new();
        let instance = Instance::new(&counter_class(&registry), &MainLoop::new()).unwrap();

        assert!(matches!(
            instance.set_property("label", "x"),
            Err(CoreError::PropertyReadOnly { .. })
        ));
        assert!(matches!(
            instance.property("missing"),
            Err(CoreError::PropertyNotFound { .. })
        ));

        instance.set_property("sealed", true).unwrap();
        instance.finish_construction();
        assert!(matches!(
            instance.set_property("sealed", false),
            Err(CoreError::ConstructOnly { .. })
        ));
        assert_eq!(instance.property("sealed").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_accessor_takes_over_storage() {
        let registry = TypeRegistry::new();
        let instance = Instance::new(&counter_class(&registry), &MainLoop::new()).unwrap();
        let backing = Arc::new(Mutex::new(0));

        let read = backing.clone();
        let write = backing.clone();
        instance.define_accessor(
            "count",
            Accessor::new(
                move |_| Some(Value::Int(*read.lock())),
                move |_, value| *write.lock() = value.as_int().unwrap_or_default(),
            ),
        );

        instance.set_property("count", 42).unwrap();
        assert_eq!(*backing.lock(), 42);
        assert_eq!(instance.property("count").unwrap(), Value::Int(42));
        assert!(instance.accessor("count").unwrap().is_complete());
    }

    #[test]
    fn test_connect_emit_disconnect() {
        let registry = TypeRegistry::new();
        let instance = Instance::new(&counter_class(&registry), &MainLoop::new()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let id = instance
            .connect("changed", move |args| seen_clone.lock().push(args[0].clone()))
            .unwrap();
        assert_eq!(instance.handler_count("changed"), 1);

        instance.emit("changed", vec![Value::Int(3)]).unwrap();
        instance.disconnect(id).unwrap();
        instance.emit("changed", vec![Value::Int(4)]).unwrap();

        assert_eq!(*seen.lock(), vec![Value::Int(3)]);
        assert_eq!(instance.handler_count("changed"), 0);
        assert_eq!(instance.disconnect(id), Err(CoreError::HandlerNotFound));
    }

    #[test]
    fn test_emit_checks_arguments() {
        let registry = TypeRegistry::new();
        let instance = Instance::new(&counter_class(&registry), &MainLoop::new()).unwrap();

        assert!(matches!(
            instance.emit("changed", vec![]),
            Err(CoreError::ArgumentMismatch { .. })
        ));
        assert!(matches!(
            instance.emit("changed", vec![Value::from("3")]),
            Err(CoreError::ArgumentMismatch { .. })
        ));
        assert!(matches!(
            instance.emit("missing", vec![]),
            Err(CoreError::SignalNotFound { .. })
        ));
        assert!(matches!(
            instance.connect("changed::detail", |_| {}),
            Err(CoreError::SignalNotFound { .. })
        ));
    }

    #[test]
    fn test_true_handled_accumulator_stops() {
        let registry = TypeRegistry::new();
        let instance = Instance::new(&counter_class(&registry), &MainLoop::new()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        for handled in [false, true, false] {
            let calls = calls.clone();
            instance
                .connect_with_return("close-request", move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some(Value::Bool(handled))
                })
                .unwrap();
        }

        let result = instance.emit("close-request", vec![]).unwrap();
        assert_eq!(result, Some(Value::Bool(true)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_notify_is_detailed() {
        let registry = TypeRegistry::new();
        let instance = Instance::new(&counter_class(&registry), &MainLoop::new()).unwrap();
        let count_notifies = Arc::new(AtomicUsize::new(0));
        let any_notifies = Arc::new(AtomicUsize::new(0));

        let c = count_notifies.clone();
        instance
            .connect("notify::count", move |args| {
                assert_eq!(args, [Value::from("count")]);
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let a = any_notifies.clone();
        instance
            .connect("notify", move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        instance.set_property("count", 1).unwrap();
        assert_eq!(count_notifies.load(Ordering::SeqCst), 0);

        instance.notify("count").unwrap();
        instance.notify("sealed").unwrap();
        assert_eq!(count_notifies.load(Ordering::SeqCst), 1);
        assert_eq!(any_notifies.load(Ordering::SeqCst), 2);
        assert_eq!(instance.handler_count("notify"), 2);
        assert_eq!(instance.handler_count("notify::count"), 1);
    }

    #[test]
    fn test_data_slots() {
        let registry = TypeRegistry::new();
        let instance = Instance::new(&registry.object_class(), &MainLoop::new()).unwrap();

        let first = instance.data_or_insert_with("group", ActionGroup::new);
        let second = instance.data_or_insert_with("group", ActionGroup::new);
        assert!(first.ptr_eq(&second));

        instance.set_data("answer", 42u32);
        assert_eq!(instance.data::<u32>("answer").as_deref(), Some(&42));
        assert!(instance.data::<String>("answer").is_none());
        assert_eq!(instance.steal_data::<u32>("answer").as_deref(), Some(&42));
        assert!(!instance.has_data("answer"));
    }

    #[test]
    fn test_application_accels_and_actions() {
        let registry = TypeRegistry::new();
        let app = Instance::new(&registry.application_class(), &MainLoop::new()).unwrap();
        let widget = Instance::new(&registry.widget_class(), &MainLoop::new()).unwrap();

        app.set_accels_for_action("app.quit", &["<Ctrl>q"]).unwrap();
        assert_eq!(app.accels_for_action("app.quit"), vec!["<Ctrl>q"]);
        assert_eq!(app.actions_for_accel("<Ctrl>q"), vec!["app.quit"]);
        assert!(matches!(
            widget.set_accels_for_action("app.quit", &["<Ctrl>q"]),
            Err(CoreError::NotAnApplication { .. })
        ));

        let fired = Arc::new(AtomicUsize::new(0));
        let quit = SimpleAction::new("quit", None).unwrap();
        let f = fired.clone();
        quit.connect_activate(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        app.action_map().unwrap().add_action(quit);
        app.activate_action("app.quit", None).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(widget.action_map().is_none());
    }

    #[test]
    fn test_abstract_class_refused() {
        let registry = TypeRegistry::new();
        let mut info = ClassInfo::new("Shape", &registry.object_class());
        info.flags = crate::types::TypeFlags::ABSTRACT;
        let shape = registry.register(info).unwrap();
        assert!(matches!(
            Instance::new(&shape, &MainLoop::new()),
            Err(CoreError::AbstractType { .. })
        ));
    }

    #[test]
    fn test_weak_upgrade() {
        let registry = TypeRegistry::new();
        let instance = Instance::new(&registry.object_class(), &MainLoop::new()).unwrap();
        let weak = instance.downgrade();
        assert!(weak.upgrade().unwrap().ptr_eq(&instance));
        drop(instance);
        assert!(weak.upgrade().is_none());
    }
}
