//! Class templates.
//!
//! A [`Template`] is the first phase of a class declaration: a base class,
//! an insertion-ordered mapping of member keys to [`Descriptor`]s and the
//! capability interfaces the class implements. It is immutable once built
//! and carries the validators of its properties.
//!
//! A template is moved into exactly one [`ClassBuilder`](crate::ClassBuilder).
//! Declaring two classes from the same template requires an explicit
//! `clone()`; each clone is independent.

use horizon_trellis_core::ClassHandle;
use indexmap::IndexMap;

use crate::accessor::ValidatorTable;
use crate::descriptor::{
    ActionDescriptor, ChildDescriptor, Descriptor, PropertyDescriptor, SignalDescriptor,
};

/// An immutable class declaration.
#[derive(Debug, Clone)]
pub struct Template {
    base: ClassHandle,
    members: IndexMap<String, Descriptor>,
    interfaces: Vec<String>,
    validators: ValidatorTable,
}

impl Template {
    /// A template deriving from `base` with the given members.
    pub fn new<I, K>(base: &ClassHandle, members: I) -> Self
    where
        I: IntoIterator<Item = (K, Descriptor)>,
        K: Into<String>,
    {
        members
            .into_iter()
            .fold(Self::builder(base), |builder, (key, descriptor)| {
                builder.member(key, descriptor)
            })
            .build()
    }

    /// A template deriving from `base` with no members.
    pub fn empty(base: &ClassHandle) -> Self {
        Self::builder(base).build()
    }

    /// Start building a template deriving from `base`.
    pub fn builder(base: &ClassHandle) -> TemplateBuilder {
        TemplateBuilder {
            base: base.clone(),
            members: IndexMap::new(),
            interfaces: Vec::new(),
            validators: ValidatorTable::new(),
        }
    }

    /// The base class.
    pub fn base(&self) -> &ClassHandle {
        &self.base
    }

    /// Members in declaration order.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.members.iter().map(|(key, descriptor)| (key.as_str(), descriptor))
    }

    /// The descriptor declared under `key`.
    pub fn get(&self, key: &str) -> Option<&Descriptor> {
        self.members.get(key)
    }

    /// Capability interfaces the class implements.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Validators of the declared properties.
    pub fn validators(&self) -> &ValidatorTable {
        &self.validators
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the template declares no member.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Builder for [`Template`].
#[derive(Debug)]
pub struct TemplateBuilder {
    base: ClassHandle,
    members: IndexMap<String, Descriptor>,
    interfaces: Vec<String>,
    validators: ValidatorTable,
}

impl TemplateBuilder {
    /// Declare a member. A later declaration under the same key replaces an
    /// earlier one.
    pub fn member(mut self, key: impl Into<String>, descriptor: impl Into<Descriptor>) -> Self {
        let key = key.into();
        let descriptor = descriptor.into();
        if let Descriptor::Property(property) = &descriptor {
            self.validators.insert(&key, property);
        }
        self.members.insert(key, descriptor);
        self
    }

    /// Declare a property.
    pub fn property(self, key: impl Into<String>, descriptor: PropertyDescriptor) -> Self {
        self.member(key, descriptor)
    }

    /// Declare a template child. Keys are conventionally prefixed with `_`.
    pub fn child(self, key: impl Into<String>, descriptor: ChildDescriptor) -> Self {
        self.member(key, descriptor)
    }

    /// Declare an action named after `key`.
    pub fn action(self, key: impl Into<String>, descriptor: ActionDescriptor) -> Self {
        self.member(key, descriptor)
    }

    /// Declare a signal named after `key`.
    pub fn signal(self, key: impl Into<String>, descriptor: SignalDescriptor) -> Self {
        self.member(key, descriptor)
    }

    /// Declare an implemented capability interface.
    pub fn implements(mut self, interface: &str) -> Self {
        if !self.interfaces.iter().any(|i| i == interface) {
            self.interfaces.push(interface.to_owned());
        }
        self
    }

    /// Finish the template.
    pub fn build(self) -> Template {
        Template {
            base: self.base,
            members: self.members,
            interfaces: self.interfaces,
            validators: self.validators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_trellis_core::TypeRegistry;

    #[test]
    fn test_members_keep_declaration_order() {
        let registry = TypeRegistry::new();
        let template = Template::builder(&registry.widget_class())
            .property("title", PropertyDescriptor::string())
            .child("_header", ChildDescriptor::new())
            .action("save", ActionDescriptor::new())
            .signal("saved", SignalDescriptor::new())
            .implements("Buildable")
            .implements("Buildable")
            .build();

        let keys: Vec<&str> = template.members().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["title", "_header", "save", "saved"]);
        assert_eq!(template.interfaces(), ["Buildable".to_owned()]);
        assert_eq!(template.validators().len(), 1);
        assert!(template.base().ptr_eq(&registry.widget_class()));
    }

    #[test]
    fn test_new_from_pairs() {
        let registry = TypeRegistry::new();
        let template = Template::new(
            &registry.object_class(),
            [
                ("count", PropertyDescriptor::int32().into()),
                ("reset", Descriptor::from(ActionDescriptor::new())),
            ],
        );
        assert_eq!(template.len(), 2);
        assert!(matches!(template.get("count"), Some(Descriptor::Property(_))));
        assert!(template.validators().get("count").is_some());
    }

    #[test]
    fn test_clones_are_independent() {
        let registry = TypeRegistry::new();
        let template = Template::builder(&registry.object_class())
            .property("value", PropertyDescriptor::double())
            .build();
        let sibling = template.clone();
        drop(template);
        assert_eq!(sibling.len(), 1);
    }
}
