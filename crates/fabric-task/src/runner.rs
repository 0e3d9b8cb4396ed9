// Task DAG execution
//
// One coordinating runner executes a composed DAG; concurrency comes
// only from the `Concurrent` combinator. Every node's outcome is
// memoized per `TaskId`, so a sub-task shared by several composite
// parents runs exactly once and every parent observes the same settled
// result — a topological schedule over all incoming edges.
//
// Failure policy: a failed node skips the rest of its sequential chain
// and propagates; a failure inside a concurrent group lets already
// started siblings settle, then the group reports the failure.
// Cancellation is cooperative: the flag is checked before any node
// starts, so a cancelled not-yet-started composite never starts its
// children, and a running concurrent group settles all siblings before
// reporting cancelled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{error, info};

use fabric_error::{TaskError, TaskResult};
use fabric_model::{Reference, ResourceId, Value};

use crate::command::ParamMap;
use crate::executor::NodeExecutor;
use crate::task::{AtomicSpec, Task, TaskId, TaskNode, TaskOutput};

/// Engine-side services the runner needs while executing a DAG.
///
/// References inside parameter maps must target concrete resources by
/// the time a task runs; hook code binds `self`-references when it
/// builds the task.
pub trait RunContext: Send + Sync {
    /// Resolve a deferred reference at execution time
    fn resolve_reference(&self, reference: &Reference) -> Option<Value>;

    /// Executor for a target node, `None` to fall back to the runner's
    /// default (local) executor
    fn executor_for(&self, node: ResourceId) -> Option<Arc<dyn NodeExecutor>>;

    /// Suspend until the resource's own lifecycle settles
    fn wait_settled(&self, id: ResourceId) -> BoxFuture<'static, TaskResult<()>>;

    /// Label used in per-command log attribution
    fn node_label(&self, id: ResourceId) -> String {
        id.to_string()
    }
}

/// Context for standalone use: no references, no waiting, no remote
/// nodes
#[derive(Debug, Default)]
pub struct NullRunContext;

impl RunContext for NullRunContext {
    fn resolve_reference(&self, _reference: &Reference) -> Option<Value> {
        None
    }

    fn executor_for(&self, _node: ResourceId) -> Option<Arc<dyn NodeExecutor>> {
        None
    }

    fn wait_settled(&self, id: ResourceId) -> BoxFuture<'static, TaskResult<()>> {
        async move { Err(TaskError::WaitFailed(id.to_string())) }.boxed()
    }
}

/// Cooperative cancellation flag shared between a runner and its owner
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

type NodeFuture = Shared<BoxFuture<'static, TaskResult<TaskOutput>>>;

struct RunnerInner {
    executor: Arc<dyn NodeExecutor>,
    context: Arc<dyn RunContext>,
    cancel: CancelToken,
    memo: Mutex<HashMap<TaskId, NodeFuture>>,
}

/// Executes task DAGs against a `NodeExecutor`
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<RunnerInner>,
}

impl TaskRunner {
    pub fn new(executor: Arc<dyn NodeExecutor>) -> Self {
        Self::with_context(executor, Arc::new(NullRunContext))
    }

    pub fn with_context(executor: Arc<dyn NodeExecutor>, context: Arc<dyn RunContext>) -> Self {
        TaskRunner {
            inner: Arc::new(RunnerInner {
                executor,
                context,
                cancel: CancelToken::new(),
                memo: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.inner.cancel.clone()
    }

    /// Execute the DAG rooted at `task`
    pub async fn run(&self, task: &Task) -> TaskResult<TaskOutput> {
        self.future_for(task).await
    }

    fn future_for(&self, task: &Task) -> NodeFuture {
        let mut memo = self.inner.memo.lock();
        if let Some(existing) = memo.get(&task.id()) {
            return existing.clone();
        }
        let fut = Self::execute(self.clone(), task.clone()).boxed().shared();
        memo.insert(task.id(), fut.clone());
        fut
    }

    async fn execute(runner: TaskRunner, task: Task) -> TaskResult<TaskOutput> {
        if runner.inner.cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        match task.node() {
            TaskNode::Empty => Ok(TaskOutput::Unit),
            TaskNode::Atomic(spec) => runner.run_atomic(spec).await,
            TaskNode::Sequential(a, b) => {
                // A failure in a skips b entirely
                runner.future_for(a).await?;
                runner.future_for(b).await
            }
            TaskNode::Concurrent(a, b) => {
                let (ra, rb) = futures::join!(runner.future_for(a), runner.future_for(b));
                match (ra, rb) {
                    (Ok(a), Ok(b)) => Ok(a.merge(b)),
                    // Both siblings have settled; report the first
                    // failure in dependency order
                    (Err(e), _) => Err(e),
                    (_, Err(e)) => Err(e),
                }
            }
            TaskNode::WaitResource(id) => {
                let waited = runner.inner.context.wait_settled(*id);
                waited.await?;
                Ok(TaskOutput::Unit)
            }
        }
    }

    async fn run_atomic(&self, spec: &AtomicSpec) -> TaskResult<TaskOutput> {
        // Dereference parameters only just before execution, so that
        // values bound by reference are read right on time
        let mut params = ParamMap::new();
        for (name, value) in &spec.params {
            let bound = match value {
                Value::Reference(reference) => self
                    .inner
                    .context
                    .resolve_reference(reference)
                    .ok_or_else(|| TaskError::MissingParameter {
                        command: spec.template.template().to_string(),
                        parameter: name.clone(),
                    })?,
                other => other.clone(),
            };
            params.insert(name.clone(), bound);
        }
        let command = spec.template.render(&params)?;

        let (executor, label) = match spec.node {
            Some(node) => (
                self.inner
                    .context
                    .executor_for(node)
                    .unwrap_or_else(|| Arc::clone(&self.inner.executor)),
                self.inner.context.node_label(node),
            ),
            None => (Arc::clone(&self.inner.executor), "(local)".to_string()),
        };

        // Truncate on a char boundary; byte indexing would panic on
        // multi-byte text
        let shown = if command.len() > 80 {
            let head: String = command.chars().take(77).collect();
            format!("{head}...")
        } else {
            command.clone()
        };
        info!(node = %label, command = %shown, "execute");

        let rv = executor
            .execute(&command, spec.output, spec.as_root)
            .await?;

        match &spec.parse {
            Some(parse) => parse(rv),
            None if rv.success() => Ok(TaskOutput::Unit),
            None => {
                error!(node = %label, command = %shown, code = rv.return_code, "command failed");
                Err(TaskError::CommandFailed {
                    node: label,
                    command,
                    code: rv.return_code,
                    stderr: rv.stderr,
                })
            }
        }
    }
}
