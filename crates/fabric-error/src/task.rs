// Errors raised while rendering or executing tasks
//
// The existence-probe "not found" outcome is deliberately absent here: it
// is a first-class probe result, not an error. Only transport and command
// failures belong in this taxonomy.

use thiserror::Error;

use crate::{ErrorDomain, FabricError};

/// Result type for task operations
pub type TaskResult<T> = Result<T, TaskError>;

/// Failures of atomic units and their composition.
///
/// Clone is required because a shared DAG node settles once and its
/// outcome is observed by every composite parent.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// Command returned a non-zero code without a parser to interpret it
    #[error("Command failed on {node} (code {code}): {command}")]
    CommandFailed {
        node: String,
        command: String,
        code: i32,
        stderr: String,
    },

    /// Command template referenced a parameter with no binding
    #[error("No binding for parameter '{parameter}' in command '{command}'")]
    MissingParameter { command: String, parameter: String },

    /// Output parser rejected the command output
    #[error("Failed to parse command output: {0}")]
    ParseFailed(String),

    /// Task was cancelled before or during execution
    #[error("Task cancelled")]
    Cancelled,

    /// The executor itself failed (transport error, spawn failure, ...)
    #[error("Executor error: {0}")]
    Executor(String),

    /// A wait-for edge referenced a resource the engine never settles
    #[error("Waited resource {0} failed to settle")]
    WaitFailed(String),
}

impl FabricError for TaskError {
    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Task
    }
}
