// The task algebra
//
// Tasks are pure descriptions: they carry no execution result until run.
// `sequential(a, b)` orders b's whole subgraph after a's; `concurrent`
// imposes no mutual order; the empty task is the identity of both
// combinators. The same sub-task may appear under several composite
// parents, making the structure a DAG rather than a tree.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fabric_error::TaskResult;
use fabric_model::{ResourceId, Value};

use crate::command::{CommandTemplate, ParamMap, ReturnValue};

/// Node identity inside one process, used by the runner to memoize
/// shared DAG nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Result of an existence probe: a first-class outcome, not an error.
/// Transport failures stay in `TaskError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Present,
    Absent,
}

/// What an executed task yields
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Unit,
    Probe(ProbeOutcome),
    /// Attribute values fetched from the target environment
    Values(BTreeMap<String, Value>),
}

impl TaskOutput {
    /// Union of two outputs; concurrent siblings setting the same key
    /// are merged last-wins
    pub fn merge(self, other: TaskOutput) -> TaskOutput {
        match (self, other) {
            (TaskOutput::Values(mut a), TaskOutput::Values(b)) => {
                a.extend(b);
                TaskOutput::Values(a)
            }
            (TaskOutput::Values(a), _) | (_, TaskOutput::Values(a)) => TaskOutput::Values(a),
            (TaskOutput::Probe(p), _) | (_, TaskOutput::Probe(p)) => TaskOutput::Probe(p),
            _ => TaskOutput::Unit,
        }
    }
}

/// Output parser mapping a raw command result to a structured outcome
pub type ParseFn = Arc<dyn Fn(ReturnValue) -> TaskResult<TaskOutput> + Send + Sync>;

/// An atomic unit: a parameterized command template plus its runtime
/// bindings and target execution context
#[derive(Clone)]
pub struct AtomicSpec {
    /// Target node, `None` for local execution
    pub node: Option<ResourceId>,
    pub template: CommandTemplate,
    pub params: ParamMap,
    pub as_root: bool,
    pub output: bool,
    pub parse: Option<ParseFn>,
}

impl AtomicSpec {
    pub fn new(template: impl Into<String>) -> Self {
        AtomicSpec {
            node: None,
            template: CommandTemplate::new(template),
            params: ParamMap::new(),
            as_root: false,
            output: false,
            parse: None,
        }
    }

    pub fn on_node(mut self, node: ResourceId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn as_root(mut self) -> Self {
        self.as_root = true;
        self
    }

    pub fn with_output(mut self) -> Self {
        self.output = true;
        self
    }

    pub fn parse_with<F>(mut self, f: F) -> Self
    where
        F: Fn(ReturnValue) -> TaskResult<TaskOutput> + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(f));
        self
    }

    /// Default probe interpretation: exit 0 means the resource exists,
    /// a non-zero exit means it must be created
    pub fn parse_as_probe(self) -> Self {
        self.with_output().parse_with(|rv| {
            Ok(TaskOutput::Probe(if rv.success() {
                ProbeOutcome::Present
            } else {
                ProbeOutcome::Absent
            }))
        })
    }
}

impl fmt::Debug for AtomicSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicSpec")
            .field("node", &self.node)
            .field("template", &self.template.template())
            .field("params", &self.params)
            .field("as_root", &self.as_root)
            .finish()
    }
}

/// Task DAG node
#[derive(Debug, Clone)]
pub enum TaskNode {
    /// Identity of both combinators
    Empty,
    Atomic(AtomicSpec),
    /// Right child starts only after the left subgraph succeeded
    Sequential(Task, Task),
    /// No mutual ordering; both must complete
    Concurrent(Task, Task),
    /// Suspend this branch until the resource's own execution settles
    WaitResource(ResourceId),
}

struct TaskInner {
    id: TaskId,
    node: TaskNode,
}

/// An immutable, shareable handle on a DAG node
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    fn wrap(node: TaskNode) -> Self {
        Task {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                node,
            }),
        }
    }

    pub fn empty() -> Self {
        Task::wrap(TaskNode::Empty)
    }

    pub fn atomic(spec: AtomicSpec) -> Self {
        Task::wrap(TaskNode::Atomic(spec))
    }

    /// Shorthand for a local atomic command with no parameters
    pub fn command(template: impl Into<String>) -> Self {
        Task::atomic(AtomicSpec::new(template))
    }

    pub fn wait_resource(id: ResourceId) -> Self {
        Task::wrap(TaskNode::WaitResource(id))
    }

    /// b begins only after a's entire subgraph completes successfully
    pub fn sequential(a: Task, b: Task) -> Self {
        match (a.is_empty(), b.is_empty()) {
            (true, _) => b,
            (_, true) => a,
            _ => Task::wrap(TaskNode::Sequential(a, b)),
        }
    }

    /// a and b may run in parallel; both must complete
    pub fn concurrent(a: Task, b: Task) -> Self {
        match (a.is_empty(), b.is_empty()) {
            (true, _) => b,
            (_, true) => a,
            _ => Task::wrap(TaskNode::Concurrent(a, b)),
        }
    }

    /// Sequence `next` after this task
    pub fn then(self, next: Task) -> Self {
        Task::sequential(self, next)
    }

    /// Run `other` concurrently with this task
    pub fn join(self, other: Task) -> Self {
        Task::concurrent(self, other)
    }

    /// Fold tasks into one sequential chain
    pub fn all_sequential(tasks: impl IntoIterator<Item = Task>) -> Self {
        tasks
            .into_iter()
            .fold(Task::empty(), Task::sequential)
    }

    /// Fold tasks into one concurrent group
    pub fn all_concurrent(tasks: impl IntoIterator<Item = Task>) -> Self {
        tasks
            .into_iter()
            .fold(Task::empty(), Task::concurrent)
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn node(&self) -> &TaskNode {
        &self.inner.node
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.inner.node, TaskNode::Empty)
    }

    /// Number of atomic units in the DAG, shared nodes counted once
    pub fn atom_count(&self) -> usize {
        fn walk(task: &Task, seen: &mut std::collections::HashSet<TaskId>) -> usize {
            if !seen.insert(task.id()) {
                return 0;
            }
            match task.node() {
                TaskNode::Atomic(_) => 1,
                TaskNode::Sequential(a, b) | TaskNode::Concurrent(a, b) => {
                    walk(a, seen) + walk(b, seen)
                }
                _ => 0,
            }
        }
        walk(self, &mut std::collections::HashSet::new())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            TaskNode::Empty => write!(f, "<Task empty>"),
            TaskNode::Atomic(spec) => {
                write!(f, "<Task {}>", spec.template.template())
            }
            TaskNode::Sequential(a, b) => write!(f, "({:?} > {:?})", a, b),
            TaskNode::Concurrent(a, b) => write!(f, "({:?} | {:?})", a, b),
            TaskNode::WaitResource(id) => write!(f, "<Task wait {}>", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_identity() {
        let atom = Task::command("true");
        let id = atom.id();
        let composed = Task::concurrent(Task::empty(), atom.clone());
        assert_eq!(composed.id(), id);
        let composed = Task::sequential(atom, Task::empty());
        assert_eq!(composed.id(), id);
    }

    #[test]
    fn test_shared_node_counted_once() {
        let shared = Task::command("shared step");
        let a = Task::sequential(Task::command("a"), shared.clone());
        let b = Task::sequential(Task::command("b"), shared);
        let dag = Task::concurrent(a, b);
        assert_eq!(dag.atom_count(), 3);
    }

    #[test]
    fn test_probe_parse_distinguishes_absent_from_present() {
        let spec = AtomicSpec::new("test -d /sys/class/net/{dev}").parse_as_probe();
        let parse = spec.parse.unwrap();
        assert_eq!(
            parse(ReturnValue::ok()).unwrap(),
            TaskOutput::Probe(ProbeOutcome::Present)
        );
        assert_eq!(
            parse(ReturnValue::failed(1)).unwrap(),
            TaskOutput::Probe(ProbeOutcome::Absent)
        );
    }
}
