// Errors raised by the requirement engine

use thiserror::Error;

use crate::{ErrorDomain, FabricError};

/// Result type for requirement checks
pub type RequirementResult<T> = Result<T, RequirementError>;

/// Failures of a requirement check or merge
#[derive(Error, Debug)]
pub enum RequirementError {
    /// The checked attribute (or the checked sub-property) does not exist
    /// on the candidate resource
    #[error("Resource {resource} has no attribute '{attribute}' required by a requirement")]
    RequiredAttribute { resource: String, attribute: String },

    /// The attribute exists but its value is outside the required set
    #[error(
        "Resource {resource}: property '{property}' of attribute '{attribute}' \
         has value {actual}, required one of {expected}"
    )]
    RequiredProperty {
        resource: String,
        attribute: String,
        property: String,
        expected: String,
        actual: String,
    },

    /// The candidate does not declare a required capability
    #[error("Resource {resource} lacks capability '{capability}'")]
    MissingCapability { resource: String, capability: String },

    /// Merging two requirements with different target attributes is a
    /// programming error and must fail loudly
    #[error("Cannot merge requirements targeting '{left}' and '{right}'")]
    MergeTargetMismatch { left: String, right: String },
}

impl FabricError for RequirementError {
    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Requirement
    }
}
