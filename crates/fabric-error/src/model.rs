// Errors raised by the attribute/schema layer

use thiserror::Error;

use crate::{ErrorDomain, FabricError};

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while declaring classes or reading/writing attributes
#[derive(Error, Debug)]
pub enum ModelError {
    /// Attribute name not declared on the class
    #[error("Unknown attribute '{attribute}' on class '{class}'")]
    UnknownAttribute { class: String, attribute: String },

    /// Attribute declared with a type that is not a registered class
    #[error("Unknown class '{class}' referenced by attribute '{attribute}'")]
    UnknownClass { class: String, attribute: String },

    /// Class registered twice
    #[error("Class '{0}' is already registered")]
    DuplicateClass(String),

    /// Parent class missing at registration time
    #[error("Class '{class}' declares unknown parent '{parent}'")]
    UnknownParent { class: String, parent: String },

    /// Value does not match the attribute's declared type
    #[error("Type mismatch for attribute '{attribute}': expected {expected}, got {actual}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        actual: String,
    },

    /// Value outside the attribute's closed choice set
    #[error("Value {value} not in choices for attribute '{attribute}'")]
    ChoiceViolation { attribute: String, value: String },

    /// Mandatory attribute left unset at construction
    #[error("Mandatory attribute '{attribute}' not set on class '{class}'")]
    MandatoryMissing { class: String, attribute: String },

    /// Write to a read-only attribute
    #[error("Attribute '{0}' is read-only")]
    ReadOnly(String),

    /// Reference could not be resolved through the registry
    #[error("Unresolved reference to attribute '{attribute}' of resource {resource}")]
    UnresolvedReference { resource: String, attribute: String },
}

impl FabricError for ModelError {
    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Model
    }
}
