// Class schemas and the schema registry
//
// Classes are declared once, dependency-first, against a registry that
// merges inherited attribute definitions, validates attribute types and
// synthesizes reverse attributes into target classes. After registration
// every (class, attribute name) pair has exactly one canonical
// definition.

use std::collections::{BTreeSet, HashMap};

use fabric_error::{ModelError, ModelResult};

use crate::attribute::AttributeSchema;
use crate::value::AttrType;

/// Declared resource class: named attributes, optional parent,
/// capability tags
#[derive(Debug, Clone)]
pub struct ClassSchema {
    name: String,
    parent: Option<String>,
    attributes: Vec<AttributeSchema>,
    capabilities: BTreeSet<String>,
}

impl ClassSchema {
    pub fn new(name: impl Into<String>) -> Self {
        ClassSchema {
            name: name.into(),
            parent: None,
            attributes: Vec::new(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn capability(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.insert(tag.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    pub fn iter_attributes(&self) -> impl Iterator<Item = &AttributeSchema> {
        self.attributes.iter()
    }

    /// Attributes that must be set at construction time
    pub fn mandatory_attributes(&self) -> impl Iterator<Item = &AttributeSchema> {
        self.attributes.iter().filter(|a| a.is_mandatory())
    }

    fn upsert_attribute(&mut self, attribute: AttributeSchema) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name() == attribute.name())
        {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }
}

/// Process-wide collection of registered classes.
///
/// Registration order matters: a class must be registered after its
/// parent and after any class its relation attributes point at (the one
/// exception being self-referential relations).
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    classes: HashMap<String, ClassSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mut class: ClassSchema) -> ModelResult<()> {
        let class_name = class.name.clone();
        if self.classes.contains_key(&class_name) {
            return Err(ModelError::DuplicateClass(class_name));
        }

        // Inheritance merge: the parent is already canonical, so one
        // level of merging is sufficient.
        if let Some(parent_name) = class.parent.clone() {
            let parent = self.classes.get(&parent_name).ok_or_else(|| {
                ModelError::UnknownParent {
                    class: class_name.clone(),
                    parent: parent_name.clone(),
                }
            })?;
            let parent_attrs: Vec<AttributeSchema> =
                parent.attributes.iter().cloned().collect();
            for parent_attr in parent_attrs {
                match class
                    .attributes
                    .iter_mut()
                    .find(|a| a.name() == parent_attr.name())
                {
                    Some(own) => {
                        own.merge(&parent_attr).map_err(|_| {
                            ModelError::UnknownAttribute {
                                class: class_name.clone(),
                                attribute: parent_attr.name().to_string(),
                            }
                        })?;
                    }
                    None => class.attributes.push(parent_attr),
                }
            }
            class
                .capabilities
                .extend(parent.capabilities.iter().cloned());
        }

        // Fail fast on unknown attribute types
        for attribute in &class.attributes {
            if let AttrType::Class(target) = attribute.ty() {
                if *target != class_name && !self.classes.contains_key(target) {
                    return Err(ModelError::UnknownClass {
                        class: target.clone(),
                        attribute: attribute.name().to_string(),
                    });
                }
            }
        }

        // Synthesize reverse attributes into target classes
        let mut reverse_inserts: Vec<(String, AttributeSchema)> = Vec::new();
        for attribute in &class.attributes {
            let Some(spec) = attribute.reverse_spec() else {
                continue;
            };
            if attribute.is_aggregate() {
                continue;
            }
            let target = match attribute.ty() {
                AttrType::Class(target) => target.clone(),
                AttrType::SelfClass => class_name.clone(),
                other => {
                    return Err(ModelError::TypeMismatch {
                        attribute: attribute.name().to_string(),
                        expected: "a relation type".to_string(),
                        actual: other.to_string(),
                    })
                }
            };
            let mut reverse =
                AttributeSchema::new(&spec.name, AttrType::Class(class_name.clone()))
                    .multiplicity(attribute.get_multiplicity().reverse())
                    .aggregate();
            if let Some(description) = &spec.description {
                reverse = reverse.description(description.clone());
            }
            reverse_inserts.push((target, reverse));
        }

        self.classes.insert(class_name.clone(), class);

        for (target, reverse) in reverse_inserts {
            // Target existence was validated above (or is the class
            // itself, inserted just now)
            if let Some(target_class) = self.classes.get_mut(&target) {
                target_class.upsert_attribute(reverse);
            }
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> ModelResult<&ClassSchema> {
        self.classes.get(name).ok_or_else(|| ModelError::UnknownClass {
            class: name.to_string(),
            attribute: String::new(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Walk the parent chain; a class is its own subclass
    pub fn is_subclass(&self, child: &str, ancestor: &str) -> bool {
        let mut current = Some(child);
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self
                .classes
                .get(name)
                .and_then(|c| c.parent_name());
        }
        false
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplicity::Multiplicity;
    use crate::requirement::{Property, Requirement};
    use crate::value::Value;

    fn node_class() -> ClassSchema {
        ClassSchema::new("node")
            .attribute(AttributeSchema::new("hostname", AttrType::String).mandatory())
            .attribute(
                AttributeSchema::new("os", AttrType::String)
                    .default_value("ubuntu"),
            )
            .capability("exec")
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = SchemaRegistry::new();
        registry.register(node_class()).unwrap();
        let node = registry.get("node").unwrap();
        assert!(node.get_attribute("hostname").is_some());
        assert!(node.capabilities().contains("exec"));
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(node_class()).unwrap();
        assert!(matches!(
            registry.register(node_class()),
            Err(ModelError::DuplicateClass(_))
        ));
    }

    #[test]
    fn test_unknown_attribute_type_fails_at_registration() {
        let mut registry = SchemaRegistry::new();
        let class = ClassSchema::new("interface").attribute(
            AttributeSchema::new("node", AttrType::Class("node".into())),
        );
        assert!(matches!(
            registry.register(class),
            Err(ModelError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_reverse_attribute_synthesis() {
        let mut registry = SchemaRegistry::new();
        registry.register(node_class()).unwrap();
        registry
            .register(
                ClassSchema::new("interface").attribute(
                    AttributeSchema::new("node", AttrType::Class("node".into()))
                        .multiplicity(Multiplicity::ManyToOne)
                        .reverse("interfaces", "Interfaces on this node"),
                ),
            )
            .unwrap();

        let node = registry.get("node").unwrap();
        let reverse = node.get_attribute("interfaces").unwrap();
        assert!(reverse.is_aggregate());
        assert!(reverse.is_collection());
        assert_eq!(reverse.get_multiplicity(), Multiplicity::OneToMany);
        assert_eq!(reverse.ty(), &AttrType::Class("interface".into()));
    }

    #[test]
    fn test_inheritance_merges_requirements_and_capabilities() {
        let mut registry = SchemaRegistry::new();
        registry.register(node_class()).unwrap();
        registry
            .register(
                ClassSchema::new("service").attribute(
                    AttributeSchema::new("node", AttrType::Class("node".into()))
                        .mandatory()
                        .requirement(
                            Requirement::new("node")
                                .property("os", Property::one("ubuntu")),
                        ),
                ),
            )
            .unwrap();
        registry
            .register(
                ClassSchema::new("dns_server")
                    .parent("service")
                    .capability("dns")
                    .attribute(
                        AttributeSchema::new("node", AttrType::Class("node".into()))
                            .multiplicity(Multiplicity::ManyToOne)
                            .reverse("dns_servers", "DNS servers on this node"),
                    ),
            )
            .unwrap();

        let dns = registry.get("dns_server").unwrap();
        let node_attr = dns.get_attribute("node").unwrap();
        // Canonical single definition carrying both the subclass's
        // multiplicity and the parent's requirement list
        assert_eq!(node_attr.get_multiplicity(), Multiplicity::ManyToOne);
        assert!(node_attr.is_mandatory());
        assert_eq!(node_attr.requirements().len(), 1);
        assert!(dns.capabilities().contains("dns"));

        assert!(registry.is_subclass("dns_server", "service"));
        assert!(!registry.is_subclass("service", "dns_server"));

        // Reverse landed on node
        let node = registry.get("node").unwrap();
        assert!(node.get_attribute("dns_servers").is_some());
    }

    #[test]
    fn test_choice_values_survive_registration() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(ClassSchema::new("link").attribute(
                AttributeSchema::new("kind", AttrType::String)
                    .choices([Value::from("wired"), Value::from("wireless")]),
            ))
            .unwrap();
        let link = registry.get("link").unwrap();
        assert_eq!(link.get_attribute("kind").unwrap().get_choices().unwrap().len(), 2);
    }
}
