// Deferred cross-resource attribute pointers
//
// A `Reference` means "the value of attribute `attribute` on resource
// `target`, resolved at commit/execution time". It lets a topology
// forward-declare resources whose dependencies are not configured yet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::ResourceId;

/// The resource operand of a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefTarget {
    /// The resource carrying the reference itself
    SelfResource,
    /// A specific resource, by identity
    Resource(ResourceId),
}

/// Lazy pointer to an attribute of another (or the same) resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub target: RefTarget,
    pub attribute: String,
}

impl Reference {
    pub fn to_self(attribute: impl Into<String>) -> Self {
        Reference {
            target: RefTarget::SelfResource,
            attribute: attribute.into(),
        }
    }

    pub fn to_resource(id: ResourceId, attribute: impl Into<String>) -> Self {
        Reference {
            target: RefTarget::Resource(id),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            RefTarget::SelfResource => write!(f, "self.{}", self.attribute),
            RefTarget::Resource(id) => write!(f, "{}.{}", id, self.attribute),
        }
    }
}
