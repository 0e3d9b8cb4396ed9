// Resource manager
//
// Owns the registry of committed resources and drives the whole
// deployment: commit expands subresources and propagates reverse
// attributes, setup resolves every requirement before a single command
// runs, then processes resources in dependency waves through
// initialize/probe/create, and teardown walks the same order in
// reverse. The manager doubles as the task runner's `RunContext`, so
// references and wait-for-resource edges resolve against live registry
// state at execution time.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use fabric_error::{EngineError, EngineResult, TaskError, TaskResult};
use fabric_model::{
    AttrSource, AttrType, ClassSchema, Reference, RefTarget, ResourceId, Scope, SchemaRegistry,
    Value,
};
use fabric_task::{
    LocalExecutor, NodeExecutor, ProbeOutcome, RunContext, Task, TaskOutput, TaskRunner,
};

use crate::lifecycle::{HookCtx, ResourceSpec, ResourceState, ResourceType};
use crate::resource::{DirtyOp, Mutation, Resource};
use crate::settings::Settings;
use crate::toposort;

struct ResourceEntry {
    resource: Resource,
    type_impl: Arc<dyn ResourceType>,
    state: ResourceState,
    // None while the lifecycle is in flight, then Some(up)
    settle: watch::Sender<Option<bool>>,
}

#[derive(Default)]
struct RegistryState {
    resources: HashMap<ResourceId, ResourceEntry>,
    by_name: HashMap<String, ResourceId>,
    commit_order: Vec<ResourceId>,
}

struct ManagerInner {
    schemas: SchemaRegistry,
    types: Mutex<HashMap<String, Arc<dyn ResourceType>>>,
    executors: Mutex<HashMap<ResourceId, Arc<dyn NodeExecutor>>>,
    default_executor: Mutex<Arc<dyn NodeExecutor>>,
    settings: Arc<Settings>,
    state: Mutex<RegistryState>,
}

/// Process-wide orchestrator; cheap to clone and share across tasks
#[derive(Clone)]
pub struct ResourceManager {
    inner: Arc<ManagerInner>,
}

impl ResourceManager {
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self::with_settings(schemas, Settings::default())
    }

    pub fn with_settings(schemas: SchemaRegistry, settings: Settings) -> Self {
        ResourceManager {
            inner: Arc::new(ManagerInner {
                schemas,
                types: Mutex::new(HashMap::new()),
                executors: Mutex::new(HashMap::new()),
                default_executor: Mutex::new(Arc::new(LocalExecutor)),
                settings: Arc::new(settings),
                state: Mutex::new(RegistryState::default()),
            }),
        }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.inner.schemas
    }

    /// Register the type implementation for its declared class
    pub fn register_type(&self, type_impl: Arc<dyn ResourceType>) {
        self.inner
            .types
            .lock()
            .insert(type_impl.class().to_string(), type_impl);
    }

    /// Executor used for commands with no per-node binding (the local
    /// shell by default)
    pub fn set_default_executor(&self, executor: Arc<dyn NodeExecutor>) {
        *self.inner.default_executor.lock() = executor;
    }

    /// Route commands targeting `node` through `executor` (an SSH
    /// session, a container exec channel, ...)
    pub fn bind_executor(&self, node: ResourceId, executor: Arc<dyn NodeExecutor>) {
        self.inner.executors.lock().insert(node, executor);
    }

    fn hook_ctx(&self) -> HookCtx {
        HookCtx {
            settings: Arc::clone(&self.inner.settings),
        }
    }

    /// Type implementation for a class, walking up the parent chain
    fn type_for(&self, class: &str) -> EngineResult<Arc<dyn ResourceType>> {
        let types = self.inner.types.lock();
        let mut current = Some(class);
        while let Some(name) = current {
            if let Some(t) = types.get(name) {
                return Ok(Arc::clone(t));
            }
            current = self
                .inner
                .schemas
                .get(name)
                .ok()
                .and_then(|c| c.parent_name());
        }
        Err(EngineError::UnknownType(class.to_string()))
    }

    // ------------------------------------------------------------------
    // Commit

    /// Add a declared resource to the registry. Validates attribute
    /// values against the class schema, propagates reverse attributes
    /// into already committed targets and recursively commits the
    /// type's subresources.
    pub fn commit(&self, spec: ResourceSpec) -> EngineResult<ResourceId> {
        self.commit_with_owner(spec, None)
    }

    fn commit_with_owner(
        &self,
        spec: ResourceSpec,
        owner: Option<ResourceId>,
    ) -> EngineResult<ResourceId> {
        let class: Arc<ClassSchema> = Arc::new(self.inner.schemas.get(&spec.class)?.clone());
        let type_impl = self.type_for(&spec.class)?;

        let mut resource = Resource::new(Arc::clone(&class));
        if let Some(name) = &spec.name {
            resource.set_name(name.clone());
        }
        if let Some(owner) = owner {
            resource.set_owner(owner);
        }
        let mut capabilities = type_impl.capabilities();
        capabilities.extend(class.capabilities().iter().cloned());
        resource.set_capabilities(capabilities);

        for (name, value) in &spec.values {
            resource.set_attr(name, value.clone())?;
        }

        // Relation slots may still be filled by requirement resolution;
        // everything else mandatory must be bound now
        for attribute in class.mandatory_attributes() {
            if attribute.is_relation() || resource.is_set(attribute.name()) {
                continue;
            }
            if resource.get_attr(attribute.name())?.is_null() {
                return Err(EngineError::Model(fabric_error::ModelError::MandatoryMissing {
                    class: class.name().to_string(),
                    attribute: attribute.name().to_string(),
                }));
            }
        }

        let id = resource.id();
        resource.mark_committed();
        info!(resource = %resource.display_name(), class = %class.name(), "commit");

        {
            let mut state = self.inner.state.lock();
            let (settle, _) = watch::channel(None);
            if let Some(name) = &spec.name {
                state.by_name.insert(name.clone(), id);
            }
            state.resources.insert(
                id,
                ResourceEntry {
                    resource,
                    type_impl: Arc::clone(&type_impl),
                    state: ResourceState::Declared,
                    settle,
                },
            );
            state.commit_order.push(id);

            for attribute in class.iter_attributes() {
                if attribute.reverse_spec().is_none() {
                    continue;
                }
                let targets = {
                    let entry = &state.resources[&id];
                    match entry.resource.attr_ids(attribute.name()) {
                        Some(ids) => ids,
                        None => continue,
                    }
                };
                let reverse_name = attribute.reverse_spec().unwrap().name.clone();
                for target in targets {
                    wire_reverse(&mut state, target, &reverse_name, id);
                }
            }
        }

        // Subresources are committed after the owner so teardown (in
        // reverse order) removes them first
        let ctx = self.hook_ctx();
        let specs = {
            let state = self.inner.state.lock();
            let entry = &state.resources[&id];
            entry.type_impl.subresources(&entry.resource, &ctx)?
        };
        for sub in specs {
            self.commit_with_owner(sub, Some(id))?;
        }
        self.set_state(id, ResourceState::SubresourcesExpanded);

        Ok(id)
    }

    // ------------------------------------------------------------------
    // Registry access

    pub fn lookup(&self, name: &str) -> Option<ResourceId> {
        self.inner.state.lock().by_name.get(name).copied()
    }

    /// Committed resources whose class is `class` or a subclass of it,
    /// in commit order
    pub fn by_class(&self, class: &str) -> Vec<ResourceId> {
        let state = self.inner.state.lock();
        state
            .commit_order
            .iter()
            .copied()
            .filter(|id| {
                self.inner
                    .schemas
                    .is_subclass(state.resources[id].resource.class_name(), class)
            })
            .collect()
    }

    /// A task edge that suspends until the resource settles; compose it
    /// into another resource's provisioning to express "after X is up"
    pub fn wait_for(&self, id: ResourceId) -> Task {
        Task::wait_resource(id)
    }

    pub fn state_of(&self, id: ResourceId) -> EngineResult<ResourceState> {
        let state = self.inner.state.lock();
        let entry = state
            .resources
            .get(&id)
            .ok_or_else(|| EngineError::UnknownResource(id.to_string()))?;
        Ok(entry.state)
    }

    /// Read access to a committed resource
    pub fn read<R>(&self, id: ResourceId, f: impl FnOnce(&Resource) -> R) -> EngineResult<R> {
        let state = self.inner.state.lock();
        let entry = state
            .resources
            .get(&id)
            .ok_or_else(|| EngineError::UnknownResource(id.to_string()))?;
        Ok(f(&entry.resource))
    }

    pub fn get_attr(&self, id: ResourceId, attribute: &str) -> EngineResult<Value> {
        self.read(id, |r| r.get_attr(attribute))?
            .map_err(EngineError::from)
    }

    pub fn set_attr(&self, id: ResourceId, attribute: &str, value: Value) -> EngineResult<()> {
        let mut state = self.inner.state.lock();
        let entry = state
            .resources
            .get_mut(&id)
            .ok_or_else(|| EngineError::UnknownResource(id.to_string()))?;
        entry.resource.set_attr(attribute, value)?;
        Ok(())
    }

    /// Append to a collection attribute; after the resource is
    /// committed the mutation is redirected to the dirty queue and
    /// applied by `reconcile`
    pub fn add_to(&self, id: ResourceId, attribute: &str, value: Value) -> EngineResult<Mutation> {
        let mut state = self.inner.state.lock();
        let entry = state
            .resources
            .get_mut(&id)
            .ok_or_else(|| EngineError::UnknownResource(id.to_string()))?;
        Ok(entry.resource.add_to(attribute, value)?)
    }

    pub fn remove_from(
        &self,
        id: ResourceId,
        attribute: &str,
        value: Value,
    ) -> EngineResult<Mutation> {
        let mut state = self.inner.state.lock();
        let entry = state
            .resources
            .get_mut(&id)
            .ok_or_else(|| EngineError::UnknownResource(id.to_string()))?;
        Ok(entry.resource.remove_from(attribute, value)?)
    }

    // ------------------------------------------------------------------
    // Requirement resolution

    /// Resolve every requirement of every committed resource. Runs to
    /// completion (or fails) before any provisioning command: a fatal
    /// zero-match aborts the deployment with nothing executed.
    pub fn resolve_requirements(&self) -> EngineResult<()> {
        let order: Vec<ResourceId> = self.inner.state.lock().commit_order.clone();
        for id in order {
            self.resolve_for(id)?;
        }
        Ok(())
    }

    fn resolve_for(&self, id: ResourceId) -> EngineResult<()> {
        let mut state = self.inner.state.lock();
        let state = &mut *state;

        let (class, label) = {
            let entry = state
                .resources
                .get(&id)
                .ok_or_else(|| EngineError::UnknownResource(id.to_string()))?;
            (entry.resource.class_arc(), entry.resource.display_name())
        };

        for attribute in class.iter_attributes() {
            for requirement in attribute.requirements().iter() {
                match requirement.scope {
                    Scope::Instance => {
                        let wired = state.resources[&id]
                            .resource
                            .attr_ids(attribute.name())
                            .unwrap_or_default();
                        for candidate in wired {
                            let Some(entry) = state.resources.get(&candidate) else {
                                continue;
                            };
                            if let Err(e) = requirement.check(&entry.resource) {
                                if requirement.fatal {
                                    warn!(resource = %label, %e, "fatal requirement violated");
                                    return Err(EngineError::UnresolvedRequirement {
                                        resource: label,
                                        attribute: attribute.name().to_string(),
                                    });
                                }
                                warn!(resource = %label, %e, "requirement violated, continuing");
                            }
                        }
                    }
                    Scope::Class => {
                        let already = state.resources[&id]
                            .resource
                            .attr_ids(attribute.name())
                            .map(|ids| !ids.is_empty())
                            .unwrap_or(false);
                        if already {
                            continue;
                        }
                        let target_class = match attribute.ty() {
                            AttrType::Class(target) => target.clone(),
                            AttrType::SelfClass => class.name().to_string(),
                            _ => continue,
                        };
                        // First satisfying candidate in commit order wins
                        let winner = state.commit_order.iter().copied().find(|cid| {
                            if *cid == id {
                                return false;
                            }
                            let entry = &state.resources[cid];
                            self.inner
                                .schemas
                                .is_subclass(entry.resource.class_name(), &target_class)
                                && requirement.check(&entry.resource).is_ok()
                        });
                        match winner {
                            Some(winner) => {
                                debug!(
                                    resource = %label,
                                    attribute = attribute.name(),
                                    winner = %state.resources[&winner].resource.display_name(),
                                    "requirement resolved"
                                );
                                let value = if attribute.is_collection() {
                                    Value::List(vec![Value::Resource(winner)])
                                } else {
                                    Value::Resource(winner)
                                };
                                state
                                    .resources
                                    .get_mut(&id)
                                    .unwrap()
                                    .resource
                                    .set_attr_raw(attribute.name(), value);
                                if let Some(spec) = attribute.reverse_spec() {
                                    let reverse_name = spec.name.clone();
                                    wire_reverse(state, winner, &reverse_name, id);
                                }
                            }
                            None if requirement.fatal => {
                                return Err(EngineError::UnresolvedRequirement {
                                    resource: label,
                                    attribute: attribute.name().to_string(),
                                });
                            }
                            None => {
                                warn!(
                                    resource = %label,
                                    attribute = attribute.name(),
                                    "no candidate satisfies requirement, slot left empty"
                                );
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle driving

    /// Deploy everything: resolve requirements, order resources by their
    /// relation and ownership edges, then drive each through its
    /// lifecycle, independent resources concurrently.
    pub async fn setup(&self) -> EngineResult<()> {
        self.resolve_requirements()?;
        let waves = self.dependency_waves()?;
        for wave in waves {
            let results =
                futures::future::join_all(wave.iter().map(|id| self.process_resource(*id))).await;
            for result in results {
                result?;
            }
        }
        Ok(())
    }

    /// Delete resources in reverse dependency order; subresources go
    /// before their owners
    pub async fn teardown(&self) -> EngineResult<()> {
        let mut waves = self.dependency_waves()?;
        waves.reverse();
        let ctx = self.hook_ctx();
        for wave in waves {
            for id in wave.into_iter().rev() {
                let reached = matches!(
                    self.state_of(id)?,
                    ResourceState::Present | ResourceState::Created | ResourceState::Settled
                );
                if !reached {
                    continue;
                }
                let task = {
                    let state = self.inner.state.lock();
                    let entry = &state.resources[&id];
                    entry.type_impl.delete(&entry.resource, &ctx)?
                };
                self.run_phase(id, "delete", &task).await?;
                self.set_state(id, ResourceState::Deleted);
            }
        }
        Ok(())
    }

    /// Replay dirty collection mutations as incremental tasks. A type
    /// with no incremental path for an attribute gets its ops dropped
    /// with a warning; the deployed state is left as-is.
    pub async fn reconcile(&self) -> EngineResult<()> {
        let order: Vec<ResourceId> = self.inner.state.lock().commit_order.clone();
        let ctx = self.hook_ctx();
        for id in order {
            let dirty = {
                let mut state = self.inner.state.lock();
                match state.resources.get_mut(&id) {
                    Some(entry) if entry.resource.has_dirty() => entry.resource.take_dirty(),
                    _ => continue,
                }
            };
            let mut queue: Vec<(String, Vec<DirtyOp>)> = dirty.into_iter().collect();
            while let Some((attribute, mut ops)) = queue.pop() {
                if let Err(e) = self.replay_ops(id, &attribute, &mut ops, &ctx).await {
                    // The failed op and everything untried go back so a
                    // later reconcile can retry
                    let mut state = self.inner.state.lock();
                    if let Some(entry) = state.resources.get_mut(&id) {
                        entry.resource.restore_dirty(&attribute, ops);
                        for (attr, rest) in queue {
                            entry.resource.restore_dirty(&attr, rest);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Replay one attribute's recorded ops in order, removing each from
    /// the queue only once its task has settled
    async fn replay_ops(
        &self,
        id: ResourceId,
        attribute: &str,
        ops: &mut Vec<DirtyOp>,
        ctx: &HookCtx,
    ) -> EngineResult<()> {
        while let Some(op) = ops.first().cloned() {
            let task = {
                let state = self.inner.state.lock();
                let entry = &state.resources[&id];
                entry
                    .type_impl
                    .attribute_op(&entry.resource, attribute, &op, ctx)?
            };
            match task {
                Some(task) => {
                    self.run_phase(id, "reconcile", &task).await?;
                    let mut state = self.inner.state.lock();
                    if let Some(entry) = state.resources.get_mut(&id) {
                        entry.resource.apply_dirty_op(attribute, &op);
                    }
                }
                None => {
                    warn!(
                        resource = %self.display(id),
                        attribute = %attribute,
                        "no incremental path for mutation, dropped"
                    );
                }
            }
            ops.remove(0);
        }
        Ok(())
    }

    /// Run an operator-invoked action (start, stop, restart, ...)
    pub async fn invoke_method(&self, id: ResourceId, name: &str) -> EngineResult<()> {
        let ctx = self.hook_ctx();
        let task = {
            let state = self.inner.state.lock();
            let entry = state
                .resources
                .get(&id)
                .ok_or_else(|| EngineError::UnknownResource(id.to_string()))?;
            entry.type_impl.method(name, &entry.resource, &ctx)?
        };
        match task {
            Some(task) => self.run_phase(id, name, &task).await,
            None => Err(EngineError::UnknownMethod {
                resource: self.display(id),
                method: name.to_string(),
            }),
        }
    }

    fn dependency_waves(&self) -> EngineResult<Vec<Vec<ResourceId>>> {
        let state = self.inner.state.lock();
        let mut deps: HashMap<ResourceId, BTreeSet<ResourceId>> = HashMap::new();
        let mut labels: HashMap<ResourceId, String> = HashMap::new();
        for (id, entry) in &state.resources {
            let mut ds = entry.resource.dependencies();
            // A subresource starts only after its owner
            if let Some(owner) = entry.resource.owner() {
                ds.insert(owner);
            }
            deps.insert(*id, ds);
            labels.insert(*id, entry.resource.display_name());
        }
        toposort::waves(&state.commit_order, &deps, &labels)
    }

    async fn process_resource(&self, id: ResourceId) -> EngineResult<()> {
        let ctx = self.hook_ctx();

        let init = {
            let state = self.inner.state.lock();
            let entry = &state.resources[&id];
            entry.type_impl.initialize(&entry.resource, &ctx)?
        };
        self.run_phase(id, "initialize", &init).await?;
        self.set_state(id, ResourceState::Initialized);

        // Probe decides whether create runs. No probe means existence
        // is unknown, so create always runs.
        let probe = {
            let state = self.inner.state.lock();
            let entry = &state.resources[&id];
            entry.type_impl.probe(&entry.resource, &ctx)?
        };
        let exists = if probe.is_empty() {
            false
        } else {
            match self.run_phase_output(id, "probe", &probe).await? {
                TaskOutput::Probe(ProbeOutcome::Absent) => false,
                _ => true,
            }
        };

        if exists {
            self.set_state(id, ResourceState::Present);
        } else {
            self.set_state(id, ResourceState::Absent);
            let (waits, create) = {
                let state = self.inner.state.lock();
                let entry = &state.resources[&id];
                let mut waits = Task::empty();
                for dep in self.must_be_up_deps(&entry.resource) {
                    waits = waits.then(Task::wait_resource(dep));
                }
                (waits, entry.type_impl.create(&entry.resource, &ctx)?)
            };
            self.run_phase(id, "create", &waits.then(create)).await?;
            self.set_state(id, ResourceState::Created);
        }

        self.set_state(id, ResourceState::Settled);
        self.notify_settled(id, true);
        Ok(())
    }

    /// Release everyone blocked in a wait-for-resource edge; a failed
    /// lifecycle releases them with an error instead of leaving them
    /// suspended
    fn notify_settled(&self, id: ResourceId, up: bool) {
        let state = self.inner.state.lock();
        if let Some(entry) = state.resources.get(&id) {
            entry.settle.send_replace(Some(up));
        }
    }

    /// Dependencies that must have settled before this resource's
    /// create runs
    fn must_be_up_deps(&self, resource: &Resource) -> BTreeSet<ResourceId> {
        let mut deps = BTreeSet::new();
        for attribute in resource.class().iter_attributes() {
            let gated = attribute.requirements().iter().any(|r| r.must_be_up);
            if !gated {
                continue;
            }
            if let Some(ids) = resource.attr_ids(attribute.name()) {
                deps.extend(ids);
            }
        }
        deps.remove(&resource.id());
        deps
    }

    fn runner(&self) -> TaskRunner {
        let executor = Arc::clone(&self.inner.default_executor.lock());
        TaskRunner::with_context(executor, Arc::new(self.clone()))
    }

    async fn run_phase(&self, id: ResourceId, phase: &str, task: &Task) -> EngineResult<()> {
        self.run_phase_output(id, phase, task).await.map(|_| ())
    }

    async fn run_phase_output(
        &self,
        id: ResourceId,
        phase: &str,
        task: &Task,
    ) -> EngineResult<TaskOutput> {
        if task.is_empty() {
            return Ok(TaskOutput::Unit);
        }
        debug!(resource = %self.display(id), phase, "run phase");
        match self.runner().run(task).await {
            Ok(output) => Ok(output),
            Err(source) => {
                self.set_state(id, ResourceState::Failed);
                self.notify_settled(id, false);
                Err(EngineError::LifecycleFailed {
                    resource: self.display(id),
                    phase: phase.to_string(),
                    source,
                })
            }
        }
    }

    fn set_state(&self, id: ResourceId, to: ResourceState) {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.resources.get_mut(&id) {
            debug!(resource = %entry.resource.display_name(), from = %entry.state, to = %to, "transition");
            entry.state = to;
        }
    }

    fn display(&self, id: ResourceId) -> String {
        let state = self.inner.state.lock();
        state
            .resources
            .get(&id)
            .map(|e| e.resource.display_name())
            .unwrap_or_else(|| id.to_string())
    }
}

/// Append `source` into `target`'s reverse slot (or set it, for scalar
/// reverse multiplicities). Bypasses validation: reverse attributes are
/// registry-managed.
fn wire_reverse(state: &mut RegistryState, target: ResourceId, reverse_name: &str, source: ResourceId) {
    let Some(entry) = state.resources.get_mut(&target) else {
        return;
    };
    let Some(is_collection) = entry
        .resource
        .class()
        .get_attribute(reverse_name)
        .map(|a| a.is_collection())
    else {
        return;
    };
    if is_collection {
        let mut items = match entry.resource.get_attr(reverse_name) {
            Ok(Value::List(items)) => items,
            _ => Vec::new(),
        };
        if !items.contains(&Value::Resource(source)) {
            items.push(Value::Resource(source));
        }
        entry.resource.set_attr_raw(reverse_name, Value::List(items));
    } else {
        entry.resource.set_attr_raw(reverse_name, Value::Resource(source));
    }
}

impl RunContext for ResourceManager {
    fn resolve_reference(&self, reference: &Reference) -> Option<Value> {
        let id = match reference.target {
            RefTarget::Resource(id) => id,
            // Self-references must be bound by the hook that built the
            // task
            RefTarget::SelfResource => return None,
        };
        let state = self.inner.state.lock();
        let entry = state.resources.get(&id)?;
        entry.resource.get_attr(&reference.attribute).ok()
    }

    fn executor_for(&self, node: ResourceId) -> Option<Arc<dyn NodeExecutor>> {
        self.inner.executors.lock().get(&node).cloned()
    }

    fn wait_settled(&self, id: ResourceId) -> BoxFuture<'static, TaskResult<()>> {
        let receiver = {
            let state = self.inner.state.lock();
            state.resources.get(&id).map(|e| e.settle.subscribe())
        };
        async move {
            let mut receiver =
                receiver.ok_or_else(|| TaskError::WaitFailed(id.to_string()))?;
            loop {
                match *receiver.borrow_and_update() {
                    Some(true) => return Ok(()),
                    Some(false) => {
                        return Err(TaskError::WaitFailed(format!(
                            "{id} failed before settling"
                        )))
                    }
                    None => {}
                }
                receiver
                    .changed()
                    .await
                    .map_err(|_| TaskError::WaitFailed(id.to_string()))?;
            }
        }
        .boxed()
    }

    fn node_label(&self, id: ResourceId) -> String {
        self.display(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_model::{AttributeSchema, ClassSchema, Multiplicity, Property, Requirement};

    struct Passive {
        class: &'static str,
        caps: Vec<&'static str>,
    }

    impl ResourceType for Passive {
        fn class(&self) -> &str {
            self.class
        }

        fn capabilities(&self) -> BTreeSet<String> {
            self.caps.iter().map(|s| s.to_string()).collect()
        }
    }

    fn testbed() -> ResourceManager {
        let mut schemas = SchemaRegistry::new();
        schemas
            .register(
                ClassSchema::new("node")
                    .attribute(AttributeSchema::new("hostname", AttrType::String).mandatory())
                    .attribute(AttributeSchema::new("os", AttrType::String).default_value("ubuntu")),
            )
            .unwrap();
        schemas
            .register(
                ClassSchema::new("interface").attribute(
                    AttributeSchema::new("node", AttrType::Class("node".into()))
                        .multiplicity(Multiplicity::ManyToOne)
                        .reverse("interfaces", "Interfaces on this node"),
                ),
            )
            .unwrap();
        let manager = ResourceManager::new(schemas);
        manager.register_type(Arc::new(Passive { class: "node", caps: vec!["exec"] }));
        manager.register_type(Arc::new(Passive { class: "interface", caps: vec![] }));
        manager
    }

    #[test]
    fn test_commit_validates_mandatory() {
        let manager = testbed();
        let err = manager.commit(ResourceSpec::new("node")).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Model(fabric_error::ModelError::MandatoryMissing { .. })
        ));
    }

    #[test]
    fn test_commit_propagates_reverse_attribute() {
        let manager = testbed();
        let node = manager
            .commit(ResourceSpec::new("node").named("n1").value("hostname", "n1"))
            .unwrap();
        let eth0 = manager
            .commit(ResourceSpec::new("interface").value("node", Value::Resource(node)))
            .unwrap();
        let eth1 = manager
            .commit(ResourceSpec::new("interface").value("node", Value::Resource(node)))
            .unwrap();

        assert_eq!(
            manager.get_attr(node, "interfaces").unwrap(),
            Value::List(vec![Value::Resource(eth0), Value::Resource(eth1)])
        );
    }

    #[test]
    fn test_lookup_by_name() {
        let manager = testbed();
        let node = manager
            .commit(ResourceSpec::new("node").named("n1").value("hostname", "n1"))
            .unwrap();
        assert_eq!(manager.lookup("n1"), Some(node));
        assert_eq!(manager.lookup("n2"), None);
    }

    #[test]
    fn test_class_scope_resolution_picks_first_in_commit_order() {
        let mut schemas = SchemaRegistry::new();
        schemas
            .register(
                ClassSchema::new("node")
                    .attribute(AttributeSchema::new("hostname", AttrType::String).mandatory())
                    .attribute(AttributeSchema::new("os", AttrType::String).default_value("ubuntu")),
            )
            .unwrap();
        schemas
            .register(
                ClassSchema::new("service").attribute(
                    AttributeSchema::new("node", AttrType::Class("node".into())).requirement(
                        Requirement::new("node")
                            .scope(Scope::Class)
                            .property("os", Property::one("debian")),
                    ),
                ),
            )
            .unwrap();
        let manager = ResourceManager::new(schemas);
        manager.register_type(Arc::new(Passive { class: "node", caps: vec![] }));
        manager.register_type(Arc::new(Passive { class: "service", caps: vec![] }));

        let _ubuntu = manager
            .commit(ResourceSpec::new("node").value("hostname", "a"))
            .unwrap();
        let debian1 = manager
            .commit(
                ResourceSpec::new("node")
                    .value("hostname", "b")
                    .value("os", "debian"),
            )
            .unwrap();
        let _debian2 = manager
            .commit(
                ResourceSpec::new("node")
                    .value("hostname", "c")
                    .value("os", "debian"),
            )
            .unwrap();
        let svc = manager.commit(ResourceSpec::new("service")).unwrap();

        manager.resolve_requirements().unwrap();
        assert_eq!(
            manager.get_attr(svc, "node").unwrap(),
            Value::Resource(debian1)
        );
    }

    #[test]
    fn test_fatal_unresolved_requirement_aborts() {
        let mut schemas = SchemaRegistry::new();
        schemas
            .register(ClassSchema::new("node").attribute(
                AttributeSchema::new("hostname", AttrType::String),
            ))
            .unwrap();
        schemas
            .register(
                ClassSchema::new("service").attribute(
                    AttributeSchema::new("node", AttrType::Class("node".into())).requirement(
                        Requirement::new("node")
                            .scope(Scope::Class)
                            .capability("vpp"),
                    ),
                ),
            )
            .unwrap();
        let manager = ResourceManager::new(schemas);
        manager.register_type(Arc::new(Passive { class: "node", caps: vec![] }));
        manager.register_type(Arc::new(Passive { class: "service", caps: vec![] }));

        manager.commit(ResourceSpec::new("node")).unwrap();
        manager.commit(ResourceSpec::new("service")).unwrap();
        let err = manager.resolve_requirements().unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedRequirement { .. }));
    }
}
