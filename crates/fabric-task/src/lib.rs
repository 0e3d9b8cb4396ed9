// Task algebra and execution
//
// A `Task` is an immutable description of provisioning work: an atomic
// command, a no-op, a wait-for-resource edge, or a sequential/concurrent
// composition of two tasks. Arc sharing makes the structure a DAG; the
// `TaskRunner` executes it with a topological schedule, memoizing shared
// nodes so each runs exactly once.

mod command;
mod executor;
mod runner;
mod task;

pub use command::{CommandTemplate, ParamMap, ReturnValue};
pub use executor::{LocalExecutor, MockExecutor, NodeExecutor};
pub use runner::{CancelToken, NullRunContext, RunContext, TaskRunner};
pub use task::{AtomicSpec, ParseFn, ProbeOutcome, Task, TaskId, TaskNode, TaskOutput};
