// Resource lifecycle contract
//
// Concrete resource types implement a fixed set of hooks, each returning
// a task-algebra expression. Hooks build descriptions; they never
// execute anything themselves. The manager drives the per-instance state
// machine and runs whatever the hooks return.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use fabric_error::EngineResult;
use fabric_model::Value;
use fabric_task::Task;

use crate::resource::{DirtyOp, Resource};
use crate::settings::Settings;

/// Lifecycle phase of a resource instance, driven by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Declared,
    SubresourcesExpanded,
    Initialized,
    /// Probe reported the resource already exists
    Present,
    /// Probe reported the resource must be created
    Absent,
    Created,
    Deleted,
    Settled,
    Failed,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceState::Declared => "declared",
            ResourceState::SubresourcesExpanded => "subresources-expanded",
            ResourceState::Initialized => "initialized",
            ResourceState::Present => "present",
            ResourceState::Absent => "absent",
            ResourceState::Created => "created",
            ResourceState::Deleted => "deleted",
            ResourceState::Settled => "settled",
            ResourceState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Declarative description of a resource to instantiate
#[derive(Debug, Clone, Default)]
pub struct ResourceSpec {
    pub class: String,
    pub name: Option<String>,
    pub values: HashMap<String, Value>,
}

impl ResourceSpec {
    pub fn new(class: impl Into<String>) -> Self {
        ResourceSpec {
            class: class.into(),
            name: None,
            values: HashMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn value(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }
}

/// Context handed to every hook invocation
#[derive(Clone)]
pub struct HookCtx {
    pub settings: Arc<Settings>,
}

/// The plugin contract every concrete resource type satisfies.
///
/// Defaults implement the tie-break policy: no probe means existence is
/// unknown and `create` always runs; an empty `create` means the
/// resource is treated as already satisfied; an empty `delete` means
/// nothing to tear down.
pub trait ResourceType: Send + Sync {
    /// Class this type implements (must be registered in the schema
    /// registry)
    fn class(&self) -> &str;

    /// Capability tags used by requirement resolution
    fn capabilities(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Auxiliary child resources, expanded into the graph during commit.
    /// Must be pure: called once per commit.
    fn subresources(&self, _resource: &Resource, _ctx: &HookCtx) -> EngineResult<Vec<ResourceSpec>> {
        Ok(Vec::new())
    }

    /// One-time instance setup, after subresources and before
    /// probe/create
    fn initialize(&self, _resource: &Resource, _ctx: &HookCtx) -> EngineResult<Task> {
        Ok(Task::empty())
    }

    /// Probe whether the resource already exists in the target
    /// environment. The returned task should yield a probe outcome;
    /// transport failures must stay errors.
    fn probe(&self, _resource: &Resource, _ctx: &HookCtx) -> EngineResult<Task> {
        Ok(Task::empty())
    }

    /// Bring the resource into existence
    fn create(&self, _resource: &Resource, _ctx: &HookCtx) -> EngineResult<Task> {
        Ok(Task::empty())
    }

    /// Remove the resource
    fn delete(&self, _resource: &Resource, _ctx: &HookCtx) -> EngineResult<Task> {
        Ok(Task::empty())
    }

    /// Operator-invoked custom action (start, stop, restart, ...)
    fn method(&self, _name: &str, _resource: &Resource, _ctx: &HookCtx) -> EngineResult<Option<Task>> {
        Ok(None)
    }

    /// Incremental reconciliation of one recorded dirty op ("add this
    /// one interface to this already-running bridge"). `None` means the
    /// type has no incremental path for this attribute.
    fn attribute_op(
        &self,
        _resource: &Resource,
        _attribute: &str,
        _op: &DirtyOp,
        _ctx: &HookCtx,
    ) -> EngineResult<Option<Task>> {
        Ok(None)
    }
}

/// How a composed type combines `create` contributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreatePolicy {
    /// Primary's create runs first, then each remaining part's, in
    /// declared order
    #[default]
    InheritParent,
    /// Only the primary part contributes
    OverrideParent,
}

/// Explicit composition of several capability contributions into one
/// resource type.
///
/// Replaces implicit method-resolution-order: a resource that is both,
/// say, a managed service and a DNS resource lists both parts and hook
/// resolution composes their contributions in the declared linear
/// order, deterministically.
pub struct ComposedType {
    class: String,
    parts: Vec<Arc<dyn ResourceType>>,
    create_policy: CreatePolicy,
}

impl ComposedType {
    pub fn new(class: impl Into<String>, parts: Vec<Arc<dyn ResourceType>>) -> Self {
        assert!(!parts.is_empty(), "composed type needs at least one part");
        ComposedType {
            class: class.into(),
            parts,
            create_policy: CreatePolicy::default(),
        }
    }

    pub fn create_policy(mut self, policy: CreatePolicy) -> Self {
        self.create_policy = policy;
        self
    }
}

impl ResourceType for ComposedType {
    fn class(&self) -> &str {
        &self.class
    }

    fn capabilities(&self) -> BTreeSet<String> {
        self.parts
            .iter()
            .flat_map(|p| p.capabilities())
            .collect()
    }

    fn subresources(&self, resource: &Resource, ctx: &HookCtx) -> EngineResult<Vec<ResourceSpec>> {
        let mut specs = Vec::new();
        for part in &self.parts {
            specs.extend(part.subresources(resource, ctx)?);
        }
        Ok(specs)
    }

    fn initialize(&self, resource: &Resource, ctx: &HookCtx) -> EngineResult<Task> {
        let mut task = Task::empty();
        for part in &self.parts {
            task = task.then(part.initialize(resource, ctx)?);
        }
        Ok(task)
    }

    /// First part declaring a probe wins; the linear order makes the
    /// choice deterministic
    fn probe(&self, resource: &Resource, ctx: &HookCtx) -> EngineResult<Task> {
        for part in &self.parts {
            let task = part.probe(resource, ctx)?;
            if !task.is_empty() {
                return Ok(task);
            }
        }
        Ok(Task::empty())
    }

    fn create(&self, resource: &Resource, ctx: &HookCtx) -> EngineResult<Task> {
        match self.create_policy {
            CreatePolicy::OverrideParent => self.parts[0].create(resource, ctx),
            CreatePolicy::InheritParent => {
                let mut task = Task::empty();
                for part in &self.parts {
                    task = task.then(part.create(resource, ctx)?);
                }
                Ok(task)
            }
        }
    }

    /// Teardown composes in reverse declared order
    fn delete(&self, resource: &Resource, ctx: &HookCtx) -> EngineResult<Task> {
        let mut task = Task::empty();
        for part in self.parts.iter().rev() {
            task = task.then(part.delete(resource, ctx)?);
        }
        Ok(task)
    }

    fn method(&self, name: &str, resource: &Resource, ctx: &HookCtx) -> EngineResult<Option<Task>> {
        for part in &self.parts {
            if let Some(task) = part.method(name, resource, ctx)? {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    fn attribute_op(
        &self,
        resource: &Resource,
        attribute: &str,
        op: &DirtyOp,
        ctx: &HookCtx,
    ) -> EngineResult<Option<Task>> {
        for part in &self.parts {
            if let Some(task) = part.attribute_op(resource, attribute, op, ctx)? {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_model::{ClassSchema, SchemaRegistry};

    struct Part {
        class: &'static str,
        create_cmd: &'static str,
        cap: &'static str,
    }

    impl ResourceType for Part {
        fn class(&self) -> &str {
            self.class
        }

        fn capabilities(&self) -> BTreeSet<String> {
            [self.cap.to_string()].into()
        }

        fn create(&self, _resource: &Resource, _ctx: &HookCtx) -> EngineResult<Task> {
            Ok(Task::command(self.create_cmd))
        }
    }

    fn dummy_resource() -> Resource {
        let mut registry = SchemaRegistry::new();
        registry.register(ClassSchema::new("svc")).unwrap();
        Resource::new(Arc::new(registry.get("svc").unwrap().clone()))
    }

    fn ctx() -> HookCtx {
        HookCtx {
            settings: Arc::new(Settings::default()),
        }
    }

    #[test]
    fn test_composed_create_inherits_in_declared_order() {
        let composed = ComposedType::new(
            "svc",
            vec![
                Arc::new(Part { class: "svc", create_cmd: "child", cap: "a" }),
                Arc::new(Part { class: "svc", create_cmd: "parent", cap: "b" }),
            ],
        );
        let task = composed.create(&dummy_resource(), &ctx()).unwrap();
        assert_eq!(task.atom_count(), 2);
        assert_eq!(format!("{:?}", task), "(<Task child> > <Task parent>)");
    }

    #[test]
    fn test_composed_create_override_keeps_primary_only() {
        let composed = ComposedType::new(
            "svc",
            vec![
                Arc::new(Part { class: "svc", create_cmd: "child", cap: "a" }),
                Arc::new(Part { class: "svc", create_cmd: "parent", cap: "b" }),
            ],
        )
        .create_policy(CreatePolicy::OverrideParent);
        let task = composed.create(&dummy_resource(), &ctx()).unwrap();
        assert_eq!(task.atom_count(), 1);
    }

    #[test]
    fn test_composed_capabilities_union() {
        let composed = ComposedType::new(
            "svc",
            vec![
                Arc::new(Part { class: "svc", create_cmd: "x", cap: "service" }),
                Arc::new(Part { class: "svc", create_cmd: "y", cap: "dns" }),
            ],
        );
        let caps = composed.capabilities();
        assert!(caps.contains("service"));
        assert!(caps.contains("dns"));
    }
}
