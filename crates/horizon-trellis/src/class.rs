//! Class registration and instantiation.
//!
//! [`ClassBuilder`] is the second phase of a declaration. It consumes a
//! [`Template`], adds class options and manually declared members, and
//! registers one platform class. The returned [`RegisteredClass`] creates
//! instances, running the per-instance steps in a fixed order:
//!
//! 1. template children are bound and type-checked
//! 2. the class initializers run
//! 3. writable properties get validating accessors
//! 4. construct properties are written (supplied or default) and the
//!    instance is sealed
//! 5. the remaining supplied properties are written
//! 6. declared actions are wired to the instance's action container
//! 7. the ready hooks, if any, are scheduled for the next idle cycle
//!
//! A class registered here may itself be the base of another declaration.
//! Each step then covers the members of every registered ancestor, root
//! first, so inherited properties keep their validation and inherited
//! actions and hooks still run.
//!
//! # Example
//!
//! ```
//! use horizon_trellis::{ClassBuilder, PropertyDescriptor, Template};
//! use horizon_trellis_core::{Accessor, MainLoop, TypeRegistry, Value};
//!
//! let registry = TypeRegistry::new();
//! let template = Template::builder(&registry.object_class())
//!     .property("level", PropertyDescriptor::int32().with_range(0.0, 10.0))
//!     .build();
//!
//! let class = ClassBuilder::new("Gauge", template)
//!     .accessor(
//!         "level",
//!         Accessor::new(
//!             |gauge| gauge.stored_value("level"),
//!             |gauge, value| gauge.store_value("level", value),
//!         ),
//!     )
//!     .register(&registry)
//!     .unwrap();
//!
//! let gauge = class.create(&MainLoop::new()).unwrap();
//! gauge.set_property("level", 42).unwrap();
//! assert_eq!(gauge.property("level").unwrap(), Value::Int(10));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use horizon_trellis_core::{
    Accessor, ClassHandle, ClassInfo, ClassTreeDebug, CoreError, Instance, MainLoop, ParamSpec,
    SignalSpec, TreeFormatOptions, TypeFlags, TypeRegistry, Value, canonical_name,
};
use indexmap::IndexMap;

use crate::accessor::{Validator, ValidatorTable, install_accessors};
use crate::actions::wire_actions;
use crate::descriptor::{
    ActionDescriptor, ChildDescriptor, Descriptor, PropertyDescriptor, PropertyFlags,
    SignalDescriptor, child_name,
};
use crate::error::{Error, Result};
use crate::lifecycle::{ReadyHook, ReadyResult, schedule_ready};
use crate::logging::targets;
use crate::template::Template;

/// Class data slot holding the engine members of a registered class.
const CLASS_MEMBERS_KEY: &str = "horizon-trellis-class-members";

/// Per-instance initializer.
pub type InitFn = Arc<dyn Fn(&Instance) + Send + Sync>;

/// Builder registering one class from a template.
pub struct ClassBuilder {
    name: String,
    type_name: Option<String>,
    template: Template,
    template_resource: Option<String>,
    css_name: Option<String>,
    type_flags: TypeFlags,
    properties: IndexMap<String, PropertyDescriptor>,
    validators: ValidatorTable,
    children: IndexMap<String, ChildDescriptor>,
    signals: IndexMap<String, SignalDescriptor>,
    accessors: HashMap<String, Accessor>,
    init: Option<InitFn>,
    ready: Option<ReadyHook>,
}

impl ClassBuilder {
    /// A class called `name` declared by `template`.
    pub fn new(name: impl Into<String>, template: Template) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            template,
            template_resource: None,
            css_name: None,
            type_flags: TypeFlags::empty(),
            properties: IndexMap::new(),
            validators: ValidatorTable::new(),
            children: IndexMap::new(),
            signals: IndexMap::new(),
            accessors: HashMap::new(),
            init: None,
            ready: None,
        }
    }

    /// A class called `name` deriving from `parent` with no template members.
    pub fn without_template(name: impl Into<String>, parent: &ClassHandle) -> Self {
        Self::new(name, Template::empty(parent))
    }

    /// Register under `type_name` instead of the class name.
    pub fn with_type_name(mut self, type_name: &str) -> Self {
        self.type_name = Some(type_name.to_owned());
        self
    }

    /// Attach a UI template resource path.
    pub fn with_template_resource(mut self, resource: &str) -> Self {
        self.template_resource = Some(resource.to_owned());
        self
    }

    /// Set the CSS name.
    pub fn with_css_name(mut self, css_name: &str) -> Self {
        self.css_name = Some(css_name.to_owned());
        self
    }

    /// Set abstract or final type flags.
    pub fn with_type_flags(mut self, flags: TypeFlags) -> Self {
        self.type_flags = flags;
        self
    }

    /// Declare a property outside the template. Wins over a template member
    /// of the same name.
    pub fn property(mut self, key: &str, descriptor: PropertyDescriptor) -> Self {
        self.validators.insert(key, &descriptor);
        self.properties.insert(canonical_name(key), descriptor);
        self
    }

    /// Declare a template child outside the template.
    pub fn child(mut self, key: &str, descriptor: ChildDescriptor) -> Self {
        self.children.insert(child_name(key).to_owned(), descriptor);
        self
    }

    /// Declare a signal outside the template.
    pub fn signal(mut self, key: &str, descriptor: SignalDescriptor) -> Self {
        self.signals.insert(canonical_name(key), descriptor);
        self
    }

    /// Provide the accessor pair of a writable property at class level.
    pub fn accessor(mut self, property: &str, accessor: Accessor) -> Self {
        self.accessors.insert(canonical_name(property), accessor);
        self
    }

    /// Run `init` on every new instance before properties are written.
    pub fn on_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&Instance) + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    /// Run `ready` once per instance on the next idle cycle.
    pub fn on_ready<F>(mut self, ready: F) -> Self
    where
        F: Fn(&Instance) -> ReadyResult + Send + Sync + 'static,
    {
        self.ready = Some(ReadyHook::from_fn(ready));
        self
    }

    /// Spawn `ready` once per instance on the next idle cycle.
    pub fn on_ready_async<F, Fut>(mut self, ready: F) -> Self
    where
        F: Fn(Instance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ReadyResult> + Send + 'static,
    {
        self.ready = Some(ReadyHook::from_async(ready));
        self
    }

    /// The type name the class will be registered under.
    pub fn type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or(&self.name)
    }

    /// Register the class with `registry`.
    #[tracing::instrument(target = "horizon_trellis::class", skip_all, fields(class = %self.type_name()))]
    pub fn register(self, registry: &TypeRegistry) -> Result<RegisteredClass> {
        let type_name = self.type_name().to_owned();
        let Self {
            template,
            template_resource,
            css_name,
            type_flags,
            properties: manual_properties,
            validators: manual_validators,
            children: manual_children,
            signals: manual_signals,
            accessors,
            init,
            ready,
            ..
        } = self;

        if !registry.owns(template.base()) {
            return Err(Error::configuration(
                &type_name,
                format!("base class '{}' belongs to another registry", template.base().name()),
            ));
        }

        let mut properties: IndexMap<String, PropertyDescriptor> = IndexMap::new();
        let mut children: IndexMap<String, ChildDescriptor> = IndexMap::new();
        let mut actions: IndexMap<String, ActionDescriptor> = IndexMap::new();
        let mut signals: IndexMap<String, SignalSpec> = IndexMap::new();

        for (key, descriptor) in template.members() {
            match descriptor {
                Descriptor::Property(property) => {
                    properties.insert(canonical_name(key), property.clone());
                }
                Descriptor::Child(child) => {
                    children.insert(child_name(key).to_owned(), child.clone());
                }
                Descriptor::Action(action) => {
                    actions.insert(canonical_name(key), action.clone());
                }
                Descriptor::Signal(signal) => {
                    let spec = signal.signal_spec(key);
                    signals.insert(spec.name.clone(), spec);
                }
            }
        }

        properties.extend(manual_properties);
        children.extend(manual_children);
        for (key, signal) in manual_signals {
            signals.insert(key.clone(), signal.signal_spec(&key));
        }

        let mut validators = template.validators().clone();
        validators.extend(&manual_validators);

        let mut resolved = Vec::with_capacity(properties.len());
        let mut constants = HashMap::new();
        for (name, descriptor) in &properties {
            let spec = descriptor.param_spec(&type_name, name, registry)?;
            if descriptor.flags() == PropertyFlags::Constant {
                constants.insert(name.clone(), spec.default_value());
            }
            let validator = match validators.get(name) {
                Some(validator) => validator.clone().then_convert(&spec),
                None => Validator::from_spec(&spec),
            };
            resolved.push(ResolvedProperty { spec, validator });
        }

        for (name, child) in &children {
            if let Some(expected) = child.type_name()
                && registry.lookup(expected).is_none()
            {
                return Err(Error::configuration(
                    &type_name,
                    format!("child '{name}' expects unregistered type '{expected}'"),
                ));
            }
        }

        let mut info = ClassInfo::new(type_name.clone(), template.base());
        info.interfaces = template.interfaces().to_vec();
        info.properties = resolved.iter().map(|p| p.spec.clone()).collect();
        info.children = children.keys().cloned().collect();
        info.signals = signals.into_values().collect();
        info.template = template_resource;
        info.css_name = css_name;
        info.flags = type_flags;

        let handle = registry.register(info)?;
        tracing::debug!(
            target: targets::CLASS,
            class = %type_name,
            parent = handle.parent().map(ClassHandle::name),
            properties = resolved.len(),
            children = children.len(),
            actions = actions.len(),
            "class registered"
        );

        if tracing::enabled!(target: targets::CLASS, tracing::Level::TRACE) {
            let tree = ClassTreeDebug::with_options(registry, TreeFormatOptions::detailed());
            tracing::trace!(target: targets::CLASS, "class hierarchy:\n{}", tree.format_all());
        }

        let members = Arc::new(ClassMembers {
            properties: resolved,
            children,
            actions: actions.into_iter().collect(),
            constants,
            accessors,
            init,
            ready,
        });
        handle.set_class_data(CLASS_MEMBERS_KEY, Arc::clone(&members));
        Ok(RegisteredClass { handle, members })
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("type_name", &self.type_name())
            .field("base", &self.template.base().name())
            .field("template_members", &self.template.len())
            .field("properties", &self.properties.len())
            .field("signals", &self.signals.len())
            .finish_non_exhaustive()
    }
}

struct ResolvedProperty {
    spec: ParamSpec,
    validator: Validator,
}

struct ClassMembers {
    properties: Vec<ResolvedProperty>,
    children: IndexMap<String, ChildDescriptor>,
    actions: Vec<(String, ActionDescriptor)>,
    constants: HashMap<String, Value>,
    accessors: HashMap<String, Accessor>,
    init: Option<InitFn>,
    ready: Option<ReadyHook>,
}

/// Values supplied when creating an instance.
#[derive(Debug, Default)]
pub struct ConstructArgs {
    properties: Vec<(String, Value)>,
    children: Vec<(String, Instance)>,
}

impl ConstructArgs {
    /// No supplied values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a property value.
    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.push((canonical_name(name), value.into()));
        self
    }

    /// Supply a template child. A leading `_` in `name` is ignored.
    pub fn child(mut self, name: &str, child: Instance) -> Self {
        self.children.push((child_name(name).to_owned(), child));
        self
    }
}

/// A registered class.
///
/// Cloning the handle is cheap.
#[derive(Clone)]
pub struct RegisteredClass {
    handle: ClassHandle,
    members: Arc<ClassMembers>,
}

impl RegisteredClass {
    /// The platform class.
    pub fn handle(&self) -> &ClassHandle {
        &self.handle
    }

    /// The registered type name.
    pub fn type_name(&self) -> &str {
        self.handle.name()
    }

    /// The value of a constant property, declared here or inherited.
    pub fn constant_value(&self, name: &str) -> Option<Value> {
        let name = canonical_name(name);
        self.lineage()
            .iter()
            .rev()
            .find_map(|members| members.constants.get(&name).cloned())
    }

    /// Names of the actions declared by this class itself.
    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.members.actions.iter().map(|(name, _)| name.as_str())
    }

    /// Members of this class and of every registered ancestor, root first.
    fn lineage(&self) -> Vec<Arc<ClassMembers>> {
        let mut lineage: Vec<Arc<ClassMembers>> = self
            .handle
            .parent()
            .into_iter()
            .flat_map(|parent| parent.ancestry())
            .filter_map(|class| class.class_data::<ClassMembers>(CLASS_MEMBERS_KEY))
            .collect();
        lineage.reverse();
        lineage.push(Arc::clone(&self.members));
        lineage
    }

    /// Create an instance with default property values.
    pub fn create(&self, main_loop: &MainLoop) -> Result<Instance> {
        self.create_with(main_loop, ConstructArgs::default())
    }

    /// Create an instance with supplied property values and children.
    pub fn create_with(&self, main_loop: &MainLoop, args: ConstructArgs) -> Result<Instance> {
        let class = self.handle.name();
        let lineage = self.lineage();

        let mut supplied: IndexMap<String, Value> = IndexMap::new();
        for (name, value) in args.properties {
            if self.handle.find_property(&name).is_none() {
                return Err(CoreError::PropertyNotFound {
                    class: class.to_owned(),
                    property: name,
                }
                .into());
            }
            supplied.insert(name, value);
        }

        let instance = Instance::new(&self.handle, main_loop)?;

        for (name, child) in args.children {
            let descriptor = lineage
                .iter()
                .rev()
                .find_map(|members| members.children.get(&name))
                .ok_or_else(|| {
                    Error::configuration(class, format!("no template child named '{name}'"))
                })?;
            if let Some(expected) = descriptor.type_name()
                && !child.class().ancestry().any(|ancestor| ancestor.name() == expected)
            {
                return Err(Error::ChildTypeMismatch {
                    class: class.to_owned(),
                    child: name,
                    expected: expected.to_owned(),
                    actual: child.type_name().to_owned(),
                });
            }
            instance.bind_child(&name, child);
        }

        for init in lineage.iter().filter_map(|members| members.init.as_ref()) {
            init(&instance);
        }

        let mut accessors: HashMap<String, Accessor> = HashMap::new();
        for members in &lineage {
            accessors.extend(
                members
                    .accessors
                    .iter()
                    .map(|(name, accessor)| (name.clone(), accessor.clone())),
            );
        }
        let properties: Vec<&ResolvedProperty> = lineage
            .iter()
            .flat_map(|members| members.properties.iter())
            .collect();

        install_accessors(
            &instance,
            class,
            properties.iter().map(|p| (&p.spec, &p.validator)),
            &accessors,
        )?;

        for property in properties.iter().filter(|p| p.spec.is_construct()) {
            let name = property.spec.name();
            let value = supplied
                .shift_remove(name)
                .unwrap_or_else(|| property.spec.default_value());
            let value = property.validator.validate(value)?;
            instance.set_property(name, value)?;
        }
        instance.finish_construction();

        for (name, value) in supplied {
            instance.set_property(&name, value)?;
        }

        let actions: Vec<(String, ActionDescriptor)> = lineage
            .iter()
            .flat_map(|members| members.actions.iter().cloned())
            .collect();
        wire_actions(&instance, &actions)?;

        for ready in lineage.iter().filter_map(|members| members.ready.as_ref()) {
            schedule_ready(&instance, ready.clone());
        }

        tracing::trace!(
            target: targets::CLASS,
            class,
            id = instance.id(),
            ancestors = lineage.len() - 1,
            "instance constructed"
        );
        Ok(instance)
    }
}

impl fmt::Debug for RegisteredClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredClass")
            .field("type_name", &self.type_name())
            .field("properties", &self.members.properties.len())
            .field("children", &self.members.children.len())
            .field("actions", &self.members.actions.len())
            .finish_non_exhaustive()
    }
}
