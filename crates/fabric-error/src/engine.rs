// Errors raised by the resource manager and lifecycle state machine

use thiserror::Error;

use crate::{ErrorDomain, FabricError, RequirementError, TaskError};

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures of the orchestration engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// A fatal requirement found no satisfying resource in the registry
    #[error("No resource satisfies requirement on attribute '{attribute}' of {resource}")]
    UnresolvedRequirement { resource: String, attribute: String },

    /// Attribute-edge dependencies form a cycle that toposort cannot order
    #[error("Dependency cycle involving resources: {0:?}")]
    DependencyCycle(Vec<String>),

    /// Lookup of an unregistered resource
    #[error("Unknown resource {0}")]
    UnknownResource(String),

    /// Resource type name not registered with the manager
    #[error("Unknown resource type '{0}'")]
    UnknownType(String),

    /// A lifecycle hook failed; carries the phase for attribution
    #[error("Resource {resource} failed during {phase}: {source}")]
    LifecycleFailed {
        resource: String,
        phase: String,
        #[source]
        source: TaskError,
    },

    /// State machine driven into a transition it does not define
    #[error("Invalid lifecycle transition for {resource}: {from} -> {to}")]
    InvalidTransition {
        resource: String,
        from: String,
        to: String,
    },

    /// Method invocation on a type that does not implement it
    #[error("Resource {resource} has no method '{method}'")]
    UnknownMethod { resource: String, method: String },

    /// Settings file missing or malformed
    #[error("Settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error(transparent)]
    Model(#[from] crate::ModelError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl FabricError for EngineError {
    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Engine
    }
}
