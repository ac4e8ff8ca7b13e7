//! Actions and action groups.
//!
//! A [`SimpleAction`] is a named, optionally parameterized and optionally
//! stateful command. Actions are collected in containers implementing
//! [`ActionMap`]: an [`ActionGroup`] inserted into an instance under a prefix,
//! or the built-in action map of an application or window instance.
//!
//! Activation is addressed with a detailed name `<prefix>.<action>`, for
//! example `app.quit` or `editor.save`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::error::{CoreError, CoreResult};
use crate::logging::targets;
use crate::signal::{ConnectionId, Signal};
use crate::value::{Value, ValueKind};

fn validate_action_name(name: &str) -> CoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidName {
            name: name.to_owned(),
        })
    }
}

struct ActionInner {
    name: String,
    parameter_type: Option<ValueKind>,
    state: Mutex<Option<Value>>,
    enabled: AtomicBool,
    activate: Signal<Option<Value>>,
}

/// A named command that can be activated.
///
/// Cloning the handle is cheap; clones refer to the same action.
#[derive(Clone)]
pub struct SimpleAction {
    inner: Arc<ActionInner>,
}

impl SimpleAction {
    /// A stateless action taking a parameter of `parameter_type`, or none.
    pub fn new(name: &str, parameter_type: Option<ValueKind>) -> CoreResult<Self> {
        Self::build(name, parameter_type, None)
    }

    /// A stateful action with initial `state`.
    pub fn new_stateful(name: &str, parameter_type: Option<ValueKind>, state: Value) -> CoreResult<Self> {
        Self::build(name, parameter_type, Some(state))
    }

    fn build(name: &str, parameter_type: Option<ValueKind>, state: Option<Value>) -> CoreResult<Self> {
        validate_action_name(name)?;
        Ok(Self {
            inner: Arc::new(ActionInner {
                name: name.to_owned(),
                parameter_type,
                state: Mutex::new(state),
                enabled: AtomicBool::new(true),
                activate: Signal::new(),
            }),
        })
    }

    /// The action name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The kind of parameter the action expects.
    pub fn parameter_type(&self) -> Option<ValueKind> {
        self.inner.parameter_type
    }

    /// The current state, `None` for a stateless action.
    pub fn state(&self) -> Option<Value> {
        self.inner.state.lock().clone()
    }

    /// Replace the state of a stateful action.
    ///
    /// The new state must have the same kind as the current one.
    pub fn set_state(&self, state: Value) -> CoreResult<()> {
        let mut current = self.inner.state.lock();
        match current.as_ref() {
            Some(existing) if existing.kind() == state.kind() => {
                *current = Some(state);
                Ok(())
            }
            Some(existing) => Err(CoreError::TypeMismatch {
                property: self.inner.name.clone(),
                expected: existing.kind(),
                got: state.kind(),
            }),
            None => Err(CoreError::InvalidValue {
                property: self.inner.name.clone(),
                message: "action is stateless".into(),
            }),
        }
    }

    /// Whether the action can be activated.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the action.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Connect a handler to the action's `activate` signal.
    pub fn connect_activate<F>(&self, handler: F) -> ConnectionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.inner
            .activate
            .connect(move |parameter: &Option<Value>| handler(parameter.as_ref()))
    }

    /// Disconnect an `activate` handler.
    pub fn disconnect_activate(&self, id: ConnectionId) -> bool {
        self.inner.activate.disconnect(id)
    }

    /// Activate the action.
    ///
    /// A disabled action ignores activation. The parameter must match the
    /// declared parameter type. A boolean stateful action without parameter
    /// and without handlers toggles its state.
    pub fn activate(&self, parameter: Option<Value>) -> CoreResult<()> {
        if !self.is_enabled() {
            tracing::trace!(target: targets::ACTION, action = %self.inner.name, "disabled, ignoring activation");
            return Ok(());
        }
        let matches = match (self.inner.parameter_type, parameter.as_ref()) {
            (None, None) => true,
            (Some(kind), Some(value)) => value.kind() == kind,
            _ => false,
        };
        if !matches {
            return Err(CoreError::ActionParameterMismatch {
                name: self.inner.name.clone(),
            });
        }

        if self.inner.activate.connection_count() == 0 && parameter.is_none() {
            let mut state = self.inner.state.lock();
            if let Some(Value::Bool(current)) = *state {
                *state = Some(Value::Bool(!current));
                return Ok(());
            }
        }

        tracing::trace!(target: targets::ACTION, action = %self.inner.name, "activate");
        self.inner.activate.emit(parameter);
        Ok(())
    }

    /// Whether both handles refer to the same action.
    pub fn ptr_eq(&self, other: &SimpleAction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SimpleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleAction")
            .field("name", &self.inner.name)
            .field("parameter_type", &self.inner.parameter_type)
            .field("state", &*self.inner.state.lock())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// A container of actions addressed by name.
pub trait ActionMap {
    /// Add an action, replacing any action of the same name.
    fn add_action(&self, action: SimpleAction);

    /// Look up an action by name.
    fn lookup_action(&self, name: &str) -> Option<SimpleAction>;

    /// Remove an action by name, returning it.
    fn remove_action(&self, name: &str) -> Option<SimpleAction>;

    /// Names of all actions, in insertion order.
    fn list_actions(&self) -> Vec<String>;
}

/// A shared, insertion-ordered set of actions.
///
/// Cloning the handle is cheap; clones share the same actions.
#[derive(Clone, Default)]
pub struct ActionGroup {
    actions: Arc<RwLock<IndexMap<String, SimpleAction>>>,
}

impl ActionGroup {
    /// An empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actions in the group.
    pub fn len(&self) -> usize {
        self.actions.read().len()
    }

    /// Whether the group holds no action.
    pub fn is_empty(&self) -> bool {
        self.actions.read().is_empty()
    }

    /// Whether an action of this name exists.
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.read().contains_key(name)
    }

    /// Activate the action `name`.
    pub fn activate_action(&self, name: &str, parameter: Option<Value>) -> CoreResult<()> {
        let action = self
            .lookup_action(name)
            .ok_or_else(|| CoreError::ActionNotFound {
                name: name.to_owned(),
            })?;
        action.activate(parameter)
    }

    /// Whether both handles refer to the same group.
    pub fn ptr_eq(&self, other: &ActionGroup) -> bool {
        Arc::ptr_eq(&self.actions, &other.actions)
    }
}

impl ActionMap for ActionGroup {
    fn add_action(&self, action: SimpleAction) {
        self.actions
            .write()
            .insert(action.name().to_owned(), action);
    }

    fn lookup_action(&self, name: &str) -> Option<SimpleAction> {
        self.actions.read().get(name).cloned()
    }

    fn remove_action(&self, name: &str) -> Option<SimpleAction> {
        self.actions.write().shift_remove(name)
    }

    fn list_actions(&self) -> Vec<String> {
        self.actions.read().keys().cloned().collect()
    }
}

impl fmt::Debug for ActionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionGroup")
            .field("actions", &self.list_actions())
            .finish()
    }
}

static_assertions::assert_impl_all!(SimpleAction: Send, Sync);
static_assertions::assert_impl_all!(ActionGroup: Send, Sync);
