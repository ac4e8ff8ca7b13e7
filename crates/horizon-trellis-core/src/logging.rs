//! Logging and debugging facilities for Horizon Trellis.
//!
//! This module provides:
//! - Target names for filtering the `tracing` output of each subsystem
//! - Debug visualization of the class hierarchy in a [`TypeRegistry`]
//!
//! # Tracing Integration
//!
//! Horizon Trellis uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_trellis_core::main_loop=trace")
//!     .init();
//! ```

use std::fmt::{self, Write as FmtWrite};

use crate::types::{ClassHandle, TypeRegistry};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Platform crate target.
    pub const CORE: &str = "horizon_trellis_core";
    /// Main loop (idle queue, timeouts, local futures).
    pub const MAIN_LOOP: &str = "horizon_trellis_core::main_loop";
    /// Typed signal primitive.
    pub const SIGNAL: &str = "horizon_trellis_core::signal";
    /// Instances: properties, named signals, data slots.
    pub const OBJECT: &str = "horizon_trellis_core::object";
    /// Type registry.
    pub const TYPES: &str = "horizon_trellis_core::types";
    /// Actions and action groups.
    pub const ACTION: &str = "horizon_trellis_core::action";
}

/// Style options for class tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
}

/// Configuration for class tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to list each class's own properties.
    pub show_properties: bool,
    /// Whether to list each class's own signals.
    pub show_signals: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_properties: false,
            show_signals: false,
            max_depth: None,
        }
    }
}

impl TreeFormatOptions {
    /// Options listing properties and signals.
    pub fn detailed() -> Self {
        Self {
            show_properties: true,
            show_signals: true,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing the class hierarchy of a registry.
#[derive(Debug, Clone)]
pub struct ClassTreeDebug {
    registry: TypeRegistry,
    options: TreeFormatOptions,
}

impl ClassTreeDebug {
    /// Visualize `registry` with default options.
    pub fn new(registry: &TypeRegistry) -> Self {
        Self::with_options(registry, TreeFormatOptions::default())
    }

    /// Visualize `registry` with custom options.
    pub fn with_options(registry: &TypeRegistry, options: TreeFormatOptions) -> Self {
        Self {
            registry: registry.clone(),
            options,
        }
    }

    /// Format the whole hierarchy, starting at `Object`.
    pub fn format_all(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Class Tree ({} classes):", self.registry.class_count());
        self.format_subtree_into(&self.registry.object_class(), 0, &mut output);
        output
    }

    /// Format the subtree rooted at `root`.
    pub fn format_subtree(&self, root: &ClassHandle) -> String {
        let mut output = String::new();
        self.format_subtree_into(root, 0, &mut output);
        output
    }

    fn format_subtree_into(&self, class: &ClassHandle, depth: usize, output: &mut String) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }

        let indent = self.indent(depth);
        let _ = write!(output, "{indent}{}", class.name());
        if let Some(capability) = class.capability() {
            let _ = write!(output, " <{capability:?}>");
        }
        if !class.flags().is_empty() {
            let _ = write!(output, " {:?}", class.flags());
        }
        output.push('\n');

        let member_indent = self.indent(depth + 1);
        if self.options.show_properties {
            for spec in class.own_properties() {
                let _ = writeln!(output, "{member_indent}.{} : {}", spec.name(), spec.value_kind());
            }
        }
        if self.options.show_signals {
            for signal in class.own_signals() {
                let _ = writeln!(output, "{member_indent}!{}", signal.name);
            }
        }

        let subclasses = self
            .registry
            .classes()
            .into_iter()
            .filter(|candidate| candidate.parent().is_some_and(|parent| parent.ptr_eq(class)));
        for subclass in subclasses {
            self.format_subtree_into(&subclass, depth + 1, output);
        }
    }

    fn indent(&self, depth: usize) -> String {
        if depth == 0 {
            return String::new();
        }
        let (branch, corner) = match self.options.style {
            TreeStyle::Ascii => ("|  ", "+-- "),
            TreeStyle::Unicode => ("\u{2502}  ", "\u{251c}\u{2500}\u{2500} "),
        };
        let mut prefix = branch.repeat(depth - 1);
        prefix.push_str(corner);
        prefix
    }
}

impl fmt::Display for ClassTreeDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{ParamFlags, ParamSpec};
    use crate::types::ClassInfo;

    #[test]
    fn test_tree_lists_builtins() {
        let registry = TypeRegistry::new();
        let output = ClassTreeDebug::new(&registry).format_all();
        assert!(output.contains("Class Tree (4 classes)"));
        assert!(output.contains("Object"));
        assert!(output.contains("Window <Window>"));
        assert!(output.contains("Application <Application>"));
    }

    #[test]
    fn test_tree_detailed_members() {
        let registry = TypeRegistry::new();
        let mut info = ClassInfo::new("Counter", &registry.object_class());
        info.properties
            .push(ParamSpec::int("count", "", "", ParamFlags::READWRITE, 0, 10, 0).unwrap());
        let counter = registry.register(info).unwrap();

        let output = ClassTreeDebug::with_options(&registry, TreeFormatOptions::detailed())
            .format_subtree(&counter);
        assert!(output.starts_with("Counter"));
        assert!(output.contains(".count : int32"));
    }

    #[test]
    fn test_max_depth() {
        let registry = TypeRegistry::new();
        let options = TreeFormatOptions {
            max_depth: Some(0),
            ..Default::default()
        };
        let output = ClassTreeDebug::with_options(&registry, options).format_all();
        assert!(!output.contains("Widget"));
    }

    #[test]
    fn test_targets_share_crate_prefix() {
        for target in [
            targets::MAIN_LOOP,
            targets::SIGNAL,
            targets::OBJECT,
            targets::TYPES,
            targets::ACTION,
        ] {
            let module = target.strip_prefix(targets::CORE).and_then(|rest| rest.strip_prefix("::"));
            assert!(module.is_some_and(|m| !m.is_empty()), "{target}");
        }
    }
}
