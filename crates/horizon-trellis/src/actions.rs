//! Action wiring.
//!
//! Declared actions are attached to the most specific container the
//! instance offers: an application's own action map, a window's own action
//! map, or a widget's private group inserted under the class's type name.
//! Instances with none of these capabilities skip their declared actions.

use horizon_trellis_core::{ActionGroup, ActionMap, Instance, SimpleAction};

use crate::descriptor::ActionDescriptor;
use crate::error::Result;
use crate::logging::targets;

/// Data slot holding a widget's private action group.
pub const WIDGET_GROUP_KEY: &str = "horizon-trellis-action-group";

/// A container declared actions are added to.
pub trait ActionTarget {
    /// A short description for diagnostics.
    fn kind(&self) -> &'static str;

    /// Add an action to the container.
    fn add_action(&self, action: SimpleAction);

    /// Register accelerators for the action `name`.
    fn set_accels(&self, name: &str, accels: &[String]) -> Result<()>;
}

struct ApplicationTarget {
    instance: Instance,
    map: ActionGroup,
}

impl ActionTarget for ApplicationTarget {
    fn kind(&self) -> &'static str {
        "application"
    }

    fn add_action(&self, action: SimpleAction) {
        self.map.add_action(action);
    }

    fn set_accels(&self, name: &str, accels: &[String]) -> Result<()> {
        let accels: Vec<&str> = accels.iter().map(String::as_str).collect();
        self.instance
            .set_accels_for_action(&format!("app.{name}"), &accels)?;
        Ok(())
    }
}

struct WindowTarget {
    map: ActionGroup,
}

impl ActionTarget for WindowTarget {
    fn kind(&self) -> &'static str {
        "window"
    }

    fn add_action(&self, action: SimpleAction) {
        self.map.add_action(action);
    }

    fn set_accels(&self, name: &str, _accels: &[String]) -> Result<()> {
        tracing::debug!(target: targets::ACTIONS, action = name, "accelerators need an application; ignored");
        Ok(())
    }
}

struct WidgetTarget {
    group: ActionGroup,
}

impl ActionTarget for WidgetTarget {
    fn kind(&self) -> &'static str {
        "widget"
    }

    fn add_action(&self, action: SimpleAction) {
        self.group.add_action(action);
    }

    fn set_accels(&self, name: &str, _accels: &[String]) -> Result<()> {
        tracing::debug!(target: targets::ACTIONS, action = name, "accelerators need an application; ignored");
        Ok(())
    }
}

/// The private action group of a widget, created and inserted on first use.
///
/// The group lives in the [`WIDGET_GROUP_KEY`] data slot and is inserted
/// under the instance's type name.
pub fn widget_action_group(instance: &Instance) -> ActionGroup {
    let group = ActionGroup::clone(&instance.data_or_insert_with(WIDGET_GROUP_KEY, ActionGroup::new));
    let prefix = instance.type_name();
    let inserted = instance
        .action_group(prefix)
        .is_some_and(|existing| existing.ptr_eq(&group));
    if !inserted {
        instance.insert_action_group(prefix, Some(group.clone()));
    }
    group
}

/// The action container of `instance`, chosen by capability.
pub fn resolve_target(instance: &Instance) -> Option<Box<dyn ActionTarget>> {
    if instance.is_application() {
        let map = instance.action_map()?;
        Some(Box::new(ApplicationTarget {
            instance: instance.clone(),
            map,
        }))
    } else if instance.is_window() {
        let map = instance.action_map()?;
        Some(Box::new(WindowTarget { map }))
    } else if instance.is_widget() {
        Some(Box::new(WidgetTarget {
            group: widget_action_group(instance),
        }))
    } else {
        None
    }
}

/// Build, connect and attach the declared actions of `instance`.
pub(crate) fn wire_actions(instance: &Instance, actions: &[(String, ActionDescriptor)]) -> Result<()> {
    if actions.is_empty() {
        return Ok(());
    }
    let Some(target) = resolve_target(instance) else {
        tracing::trace!(
            target: targets::ACTIONS,
            class = instance.type_name(),
            actions = actions.len(),
            "no action container; actions skipped"
        );
        return Ok(());
    };

    for (name, descriptor) in actions {
        let action = descriptor.build(name)?;
        if let Some(handler) = descriptor.handler() {
            let handler = handler.clone();
            let weak = instance.downgrade();
            action.connect_activate(move |parameter| {
                if let Some(owner) = weak.upgrade() {
                    handler(&owner, parameter);
                }
            });
        }
        instance.bind_action(name, action.clone());
        target.add_action(action);
        if !descriptor.accels().is_empty() {
            target.set_accels(name, descriptor.accels())?;
        }
        tracing::trace!(target: targets::ACTIONS, action = %name, container = target.kind(), "action wired");
    }
    Ok(())
}
