// Fabric error handling framework
// Central location for the error types of the orchestration engine

use std::fmt;

// Re-export common error handling tools for convenience
pub use anyhow;
pub use thiserror;

// Module structure
mod engine;
mod model;
mod requirement;
mod task;

// Public exports
pub use engine::{EngineError, EngineResult};
pub use model::{ModelError, ModelResult};
pub use requirement::{RequirementError, RequirementResult};
pub use task::{TaskError, TaskResult};

/// Error domains representing different components of the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    Model,
    Requirement,
    Task,
    Engine,
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDomain::Model => write!(f, "model"),
            ErrorDomain::Requirement => write!(f, "requirement"),
            ErrorDomain::Task => write!(f, "task"),
            ErrorDomain::Engine => write!(f, "engine"),
        }
    }
}

/// Trait implemented by every Fabric error type, used when a caller only
/// needs to attribute a failure to a component.
pub trait FabricError: std::error::Error {
    fn domain(&self) -> ErrorDomain;
}
