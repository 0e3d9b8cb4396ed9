// Attribute descriptors
//
// An `AttributeSchema` is the canonical definition of one named, typed
// field on a resource class: multiplicity, defaults, mandatory/read-only
// flags, attached requirements and reverse-attribute synthesis spec.
// Definitions merge down an inheritance chain at class registration.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fabric_error::RequirementResult;

use crate::multiplicity::Multiplicity;
use crate::requirement::{Requirement, RequirementList};
use crate::value::{AttrType, Value};
use crate::AttrSource;

/// Computed default: invoked lazily with the owning instance on first
/// read (supports defaults derived from the resource's other fields)
pub type DefaultFn = Arc<dyn Fn(&dyn AttrSource) -> Value + Send + Sync>;

/// Default of an attribute when unset on an instance
#[derive(Clone)]
pub enum AttrDefault {
    None,
    Literal(Value),
    Provider(DefaultFn),
}

impl AttrDefault {
    pub fn is_none(&self) -> bool {
        matches!(self, AttrDefault::None)
    }
}

impl fmt::Debug for AttrDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrDefault::None => write!(f, "None"),
            AttrDefault::Literal(v) => write!(f, "Literal({:?})", v),
            AttrDefault::Provider(_) => write!(f, "Provider(..)"),
        }
    }
}

/// Reverse-attribute synthesis spec carried by the declaring attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseSpec {
    pub name: String,
    pub description: Option<String>,
    /// Auto-instantiate the remote side on first read
    pub auto: bool,
}

/// Canonical definition of one attribute on a resource class.
///
/// Mergeable scalar properties are held as `Option` so that a subclass
/// re-declaration can distinguish "explicitly set" from "inherit from
/// the parent definition".
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    name: String,
    ty: AttrType,
    multiplicity: Option<Multiplicity>,
    mandatory: Option<bool>,
    read_only: Option<bool>,
    description: Option<String>,
    default: AttrDefault,
    choices: Option<Vec<Value>>,
    requirements: RequirementList,
    reverse: Option<ReverseSpec>,
    /// Set on synthesized reverse attributes; aggregates are skipped by
    /// dependency computation to keep the reverse edge from creating a
    /// cycle
    is_aggregate: bool,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
        AttributeSchema {
            name: name.into(),
            ty,
            multiplicity: None,
            mandatory: None,
            read_only: None,
            description: None,
            default: AttrDefault::None,
            choices: None,
            requirements: RequirementList::new(),
            reverse: None,
            is_aggregate: false,
        }
    }

    pub fn multiplicity(mut self, m: Multiplicity) -> Self {
        self.multiplicity = Some(m);
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = Some(true);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = Some(true);
        self
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.description = Some(d.into());
        self
    }

    pub fn default_value(mut self, v: impl Into<Value>) -> Self {
        self.default = AttrDefault::Literal(v.into());
        self
    }

    pub fn default_provider<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn AttrSource) -> Value + Send + Sync + 'static,
    {
        self.default = AttrDefault::Provider(Arc::new(f));
        self
    }

    pub fn choices(mut self, choices: impl IntoIterator<Item = Value>) -> Self {
        self.choices = Some(choices.into_iter().collect());
        self
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        // Same-target merge cannot fail
        let _ = self.requirements.push(requirement);
        self
    }

    pub fn reverse(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.reverse = Some(ReverseSpec {
            name: name.into(),
            description: Some(description.into()),
            auto: false,
        });
        self
    }

    pub fn reverse_auto(mut self, name: impl Into<String>) -> Self {
        self.reverse = Some(ReverseSpec {
            name: name.into(),
            description: None,
            auto: true,
        });
        self
    }

    pub(crate) fn aggregate(mut self) -> Self {
        self.is_aggregate = true;
        self
    }

    // Accessors resolve the merged `Option` fields to their defaults.

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &AttrType {
        &self.ty
    }

    pub fn get_multiplicity(&self) -> Multiplicity {
        self.multiplicity.unwrap_or(Multiplicity::OneToOne)
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory.unwrap_or(false)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.unwrap_or(false)
    }

    pub fn is_collection(&self) -> bool {
        self.get_multiplicity().is_collection()
    }

    pub fn is_aggregate(&self) -> bool {
        self.is_aggregate
    }

    pub fn is_relation(&self) -> bool {
        self.ty.is_relation()
    }

    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn get_choices(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn requirements(&self) -> &RequirementList {
        &self.requirements
    }

    pub fn reverse_spec(&self) -> Option<&ReverseSpec> {
        self.reverse.as_ref()
    }

    /// Default bound value for an instance with this attribute unset.
    ///
    /// Collection attributes always yield an empty sequence, never null.
    pub fn evaluate_default(&self, instance: &dyn AttrSource) -> Value {
        let value = match &self.default {
            AttrDefault::None => Value::Null,
            AttrDefault::Literal(v) => v.clone(),
            AttrDefault::Provider(f) => f(instance),
        };
        if self.is_collection() && value.is_null() {
            Value::List(Vec::new())
        } else {
            value
        }
    }

    /// Inherit unset properties from a parent class's definition of the
    /// same attribute. Scalars: subclass wins when explicitly set.
    /// Requirement lists are extended (merged per target), choice sets
    /// are intersected.
    pub fn merge(&mut self, parent: &AttributeSchema) -> RequirementResult<()> {
        debug_assert_eq!(self.name, parent.name);

        if self.multiplicity.is_none() {
            self.multiplicity = parent.multiplicity;
        }
        if self.mandatory.is_none() {
            self.mandatory = parent.mandatory;
        }
        if self.read_only.is_none() {
            self.read_only = parent.read_only;
        }
        if self.description.is_none() {
            self.description = parent.description.clone();
        }
        if self.default.is_none() {
            self.default = parent.default.clone();
        }
        if self.reverse.is_none() {
            self.reverse = parent.reverse.clone();
        }
        self.choices = match (self.choices.take(), &parent.choices) {
            (Some(mine), Some(theirs)) => {
                Some(mine.into_iter().filter(|v| theirs.contains(v)).collect())
            }
            (mine, theirs) => mine.or_else(|| theirs.clone()),
        };
        self.requirements.extend(&parent.requirements)?;
        Ok(())
    }
}

/// Equality and hashing are name-based: two descriptors are the same
/// attribute iff their declared names match.
impl PartialEq for AttributeSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AttributeSchema {}

impl Hash for AttributeSchema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::Property;
    use std::collections::BTreeSet;

    struct Dummy;

    impl AttrSource for Dummy {
        fn attr(&self, name: &str) -> Option<Value> {
            (name == "prefix").then(|| Value::from("fab"))
        }

        fn capabilities(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }

        fn display_name(&self) -> String {
            "dummy".to_string()
        }
    }

    #[test]
    fn test_collection_default_is_empty_sequence() {
        for m in [Multiplicity::OneToMany, Multiplicity::ManyToMany] {
            let attr = AttributeSchema::new("items", AttrType::SelfClass).multiplicity(m);
            let v = attr.evaluate_default(&Dummy);
            assert_eq!(v, Value::List(Vec::new()));
        }
    }

    #[test]
    fn test_provider_default_sees_instance() {
        let attr = AttributeSchema::new("hostname", AttrType::String)
            .default_provider(|instance| {
                let prefix = instance.attr("prefix").unwrap();
                Value::from(format!("{}-host", prefix.render()))
            });
        assert_eq!(attr.evaluate_default(&Dummy), Value::from("fab-host"));
    }

    #[test]
    fn test_merge_keeps_parent_requirements() {
        // A subclass re-declaring `node` only to add multiplicity and a
        // reverse name must keep the base class's requirement list.
        let parent = AttributeSchema::new("node", AttrType::Class("node".into()))
            .requirement(
                Requirement::new("node").property("os", Property::one("ubuntu")),
            )
            .mandatory();
        let mut child = AttributeSchema::new("node", AttrType::Class("node".into()))
            .multiplicity(Multiplicity::ManyToOne)
            .reverse("items", "Items hosted on this node");
        child.merge(&parent).unwrap();

        assert_eq!(child.requirements().len(), 1);
        assert!(child.is_mandatory());
        assert_eq!(child.get_multiplicity(), Multiplicity::ManyToOne);
        assert!(child.reverse_spec().is_some());
    }

    #[test]
    fn test_merge_intersects_choices() {
        let parent = AttributeSchema::new("mode", AttrType::String)
            .choices([Value::from("bridge"), Value::from("routed")]);
        let mut child = AttributeSchema::new("mode", AttrType::String)
            .choices([Value::from("routed"), Value::from("nat")]);
        child.merge(&parent).unwrap();
        assert_eq!(child.get_choices().unwrap(), &[Value::from("routed")]);
    }

    #[test]
    fn test_name_based_equality() {
        let a = AttributeSchema::new("node", AttrType::String);
        let b = AttributeSchema::new("node", AttrType::Bool).mandatory();
        assert_eq!(a, b);
    }
}
