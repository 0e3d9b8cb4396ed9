// Resource instances
//
// A `Resource` binds attribute values to a class schema under a stable
// UUID. Cross-resource pointers are stored as UUID indirections; the
// manager resolves them through the registry. After commit, collection
// mutations are redirected into the dirty map instead of touching the
// container, so bidirectional state between a resource and its
// reverse-linked peers never diverges behind the manager's back.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use fabric_error::{ModelError, ModelResult};
use fabric_model::{AttrSource, ClassSchema, ResourceId, Value};

/// Recorded post-commit mutation of a collection attribute, awaiting
/// incremental reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum DirtyOp {
    ListAdd(Value),
    ListRemove(Value),
    ListClear,
}

/// Result of a collection mutation: either applied in place (resource
/// not yet part of the committed relational graph) or redirected to the
/// dirty-tracking path. An explicit result, never a control-flow
/// exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Mutation {
    Applied,
    Redirected,
}

/// A live instance of a declared resource class
pub struct Resource {
    id: ResourceId,
    class: Arc<ClassSchema>,
    name: Option<String>,
    owner: Option<ResourceId>,
    values: HashMap<String, Value>,
    dirty: HashMap<String, Vec<DirtyOp>>,
    capabilities: BTreeSet<String>,
    committed: bool,
}

impl Resource {
    pub fn new(class: Arc<ClassSchema>) -> Self {
        Resource {
            id: ResourceId::new(),
            class,
            name: None,
            owner: None,
            values: HashMap::new(),
            dirty: HashMap::new(),
            capabilities: BTreeSet::new(),
            committed: false,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn class(&self) -> &ClassSchema {
        &self.class
    }

    pub(crate) fn class_arc(&self) -> Arc<ClassSchema> {
        Arc::clone(&self.class)
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn owner(&self) -> Option<ResourceId> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: ResourceId) {
        self.owner = Some(owner);
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn mark_committed(&mut self) {
        self.committed = true;
    }

    pub fn set_capabilities(&mut self, capabilities: BTreeSet<String>) {
        self.capabilities = capabilities;
    }

    /// Read an attribute; unset attributes evaluate their declared
    /// default (a collection attribute yields an empty list, never null)
    pub fn get_attr(&self, name: &str) -> ModelResult<Value> {
        let attribute = self.class.get_attribute(name).ok_or_else(|| {
            ModelError::UnknownAttribute {
                class: self.class_name().to_string(),
                attribute: name.to_string(),
            }
        })?;
        match self.values.get(name) {
            Some(value) => Ok(value.clone()),
            None => Ok(attribute.evaluate_default(self)),
        }
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Write an attribute, enforcing type, choices and the read-only
    /// flag
    pub fn set_attr(&mut self, name: &str, value: Value) -> ModelResult<()> {
        let class = Arc::clone(&self.class);
        let attribute = class.get_attribute(name).ok_or_else(|| {
            ModelError::UnknownAttribute {
                class: self.class_name().to_string(),
                attribute: name.to_string(),
            }
        })?;
        if attribute.is_read_only() && self.values.contains_key(name) {
            return Err(ModelError::ReadOnly(name.to_string()));
        }
        if !attribute.ty().accepts(&value) {
            return Err(ModelError::TypeMismatch {
                attribute: name.to_string(),
                expected: attribute.ty().to_string(),
                actual: value.type_name().to_string(),
            });
        }
        if let Some(choices) = attribute.get_choices() {
            if !value.is_null() && !choices.contains(&value) {
                return Err(ModelError::ChoiceViolation {
                    attribute: name.to_string(),
                    value: value.render(),
                });
            }
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Write bypassing read-only and validation. Reserved for the
    /// manager: reverse-attribute propagation and values fetched back
    /// from the target environment.
    pub(crate) fn set_attr_raw(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Append to a collection attribute.
    ///
    /// Before commit the container is mutated in place. After commit
    /// the op is recorded as dirty and the container is left untouched;
    /// the manager replays it as an incremental task.
    pub fn add_to(&mut self, name: &str, value: Value) -> ModelResult<Mutation> {
        self.collection_op(name, DirtyOp::ListAdd(value))
    }

    pub fn remove_from(&mut self, name: &str, value: Value) -> ModelResult<Mutation> {
        self.collection_op(name, DirtyOp::ListRemove(value))
    }

    pub fn clear(&mut self, name: &str) -> ModelResult<Mutation> {
        self.collection_op(name, DirtyOp::ListClear)
    }

    fn collection_op(&mut self, name: &str, op: DirtyOp) -> ModelResult<Mutation> {
        let class = Arc::clone(&self.class);
        let attribute = class.get_attribute(name).ok_or_else(|| {
            ModelError::UnknownAttribute {
                class: self.class_name().to_string(),
                attribute: name.to_string(),
            }
        })?;
        if !attribute.is_collection() {
            return Err(ModelError::TypeMismatch {
                attribute: name.to_string(),
                expected: "collection".to_string(),
                actual: attribute.ty().to_string(),
            });
        }

        if self.committed {
            self.dirty.entry(name.to_string()).or_default().push(op);
            return Ok(Mutation::Redirected);
        }

        let mut items = match self.values.remove(name) {
            Some(Value::List(items)) => items,
            Some(other) => vec![other],
            None => match attribute.evaluate_default(self) {
                Value::List(items) => items,
                _ => Vec::new(),
            },
        };
        match op {
            DirtyOp::ListAdd(value) => items.push(value),
            DirtyOp::ListRemove(value) => items.retain(|v| *v != value),
            DirtyOp::ListClear => items.clear(),
        }
        self.values.insert(name.to_string(), Value::List(items));
        Ok(Mutation::Applied)
    }

    /// Apply a previously recorded dirty op to the underlying container,
    /// once its reconciliation task has settled
    pub(crate) fn apply_dirty_op(&mut self, name: &str, op: &DirtyOp) {
        let mut items = match self.values.remove(name) {
            Some(Value::List(items)) => items,
            _ => Vec::new(),
        };
        match op {
            DirtyOp::ListAdd(value) => items.push(value.clone()),
            DirtyOp::ListRemove(value) => items.retain(|v| v != value),
            DirtyOp::ListClear => items.clear(),
        }
        self.values.insert(name.to_string(), Value::List(items));
    }

    pub fn dirty_attrs(&self) -> impl Iterator<Item = (&str, &[DirtyOp])> {
        self.dirty.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub(crate) fn take_dirty(&mut self) -> HashMap<String, Vec<DirtyOp>> {
        std::mem::take(&mut self.dirty)
    }

    /// Put unreplayed ops back after a failed reconciliation, ahead of
    /// anything recorded since, so a later retry replays them in the
    /// original order
    pub(crate) fn restore_dirty(&mut self, name: &str, ops: Vec<DirtyOp>) {
        if ops.is_empty() {
            return;
        }
        let slot = self.dirty.entry(name.to_string()).or_default();
        let mut merged = ops;
        merged.append(slot);
        *slot = merged;
    }

    /// Resource identities held in one attribute slot, in stored order.
    /// `None` when the attribute is unknown or holds no identities.
    pub fn attr_ids(&self, name: &str) -> Option<Vec<ResourceId>> {
        let mut ids = Vec::new();
        match self.values.get(name)? {
            Value::Resource(id) => ids.push(*id),
            Value::List(items) => {
                for item in items {
                    if let Value::Resource(id) = item {
                        ids.push(*id);
                    }
                }
            }
            _ => return None,
        }
        Some(ids)
    }

    /// UUIDs of the resources this one depends on through relation
    /// attributes. Aggregate (reverse) attributes are skipped so a
    /// bidirectional link does not read as a cycle; the owner edge is
    /// handled separately by the manager.
    pub fn dependencies(&self) -> BTreeSet<ResourceId> {
        let mut deps = BTreeSet::new();
        for attribute in self.class.iter_attributes() {
            if !attribute.is_relation() || attribute.is_aggregate() {
                continue;
            }
            if let Some(value) = self.values.get(attribute.name()) {
                collect_ids(value, &mut deps);
            }
        }
        deps.remove(&self.id);
        deps
    }
}

fn collect_ids(value: &Value, out: &mut BTreeSet<ResourceId>) {
    match value {
        Value::Resource(id) => {
            out.insert(*id);
        }
        Value::List(items) => {
            for item in items {
                collect_ids(item, out);
            }
        }
        _ => {}
    }
}

impl AttrSource for Resource {
    fn attr(&self, name: &str) -> Option<Value> {
        match self.get_attr(name) {
            Ok(Value::Null) | Err(_) => None,
            Ok(value) => Some(value),
        }
    }

    fn capabilities(&self) -> BTreeSet<String> {
        self.capabilities.clone()
    }

    fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{} '{}'", self.class_name(), name),
            None => format!("{} {}", self.class_name(), self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_model::{AttrType, AttributeSchema, Multiplicity, SchemaRegistry};

    fn bridge_class() -> Arc<ClassSchema> {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                ClassSchema::new("bridge")
                    .attribute(AttributeSchema::new("name", AttrType::String).mandatory())
                    .attribute(
                        AttributeSchema::new("interfaces", AttrType::SelfClass)
                            .multiplicity(Multiplicity::OneToMany),
                    )
                    .attribute(
                        AttributeSchema::new("mtu", AttrType::Integer).default_value(1500i64),
                    ),
            )
            .unwrap();
        Arc::new(registry.get("bridge").unwrap().clone())
    }

    #[test]
    fn test_unset_attribute_yields_default() {
        let resource = Resource::new(bridge_class());
        assert_eq!(resource.get_attr("mtu").unwrap(), Value::Integer(1500));
        assert_eq!(
            resource.get_attr("interfaces").unwrap(),
            Value::List(Vec::new())
        );
    }

    #[test]
    fn test_set_attr_type_checked() {
        let mut resource = Resource::new(bridge_class());
        assert!(resource.set_attr("name", Value::from("br0")).is_ok());
        assert!(matches!(
            resource.set_attr("mtu", Value::from("jumbo")),
            Err(ModelError::TypeMismatch { .. })
        ));
        assert!(matches!(
            resource.set_attr("nope", Value::Null),
            Err(ModelError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_collection_mutation_applied_before_commit() {
        let mut resource = Resource::new(bridge_class());
        let other = ResourceId::new();
        let outcome = resource.add_to("interfaces", Value::Resource(other)).unwrap();
        assert_eq!(outcome, Mutation::Applied);
        assert_eq!(
            resource.get_attr("interfaces").unwrap(),
            Value::List(vec![Value::Resource(other)])
        );
        assert!(!resource.has_dirty());
    }

    #[test]
    fn test_collection_mutation_redirected_after_commit() {
        let mut resource = Resource::new(bridge_class());
        resource.mark_committed();
        let other = ResourceId::new();
        let outcome = resource.add_to("interfaces", Value::Resource(other)).unwrap();
        assert_eq!(outcome, Mutation::Redirected);
        // Container untouched until the manager reconciles
        assert_eq!(
            resource.get_attr("interfaces").unwrap(),
            Value::List(Vec::new())
        );
        assert!(resource.has_dirty());

        resource.apply_dirty_op("interfaces", &DirtyOp::ListAdd(Value::Resource(other)));
        assert_eq!(
            resource.get_attr("interfaces").unwrap(),
            Value::List(vec![Value::Resource(other)])
        );
    }

    #[test]
    fn test_collection_op_on_scalar_rejected() {
        let mut resource = Resource::new(bridge_class());
        assert!(matches!(
            resource.add_to("name", Value::from("br0")),
            Err(ModelError::TypeMismatch { .. })
        ));
        // The scalar slot is untouched, not wrapped into a list
        resource.set_attr("name", Value::from("br0")).unwrap();
        assert!(resource.remove_from("name", Value::from("br0")).is_err());
        assert_eq!(resource.get_attr("name").unwrap(), Value::from("br0"));
    }

    #[test]
    fn test_dependencies_from_relation_values() {
        let mut resource = Resource::new(bridge_class());
        let a = ResourceId::new();
        let b = ResourceId::new();
        resource
            .set_attr(
                "interfaces",
                Value::List(vec![Value::Resource(a), Value::Resource(b)]),
            )
            .unwrap();
        let deps = resource.dependencies();
        assert!(deps.contains(&a));
        assert!(deps.contains(&b));
    }
}
