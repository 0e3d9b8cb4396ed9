// Attribute and requirement model
//
// This crate owns the declarative side of the engine: dynamically typed
// values, attribute descriptors with multiplicity and reverse links,
// class schemas with inheritance merging, and the requirement engine
// (typed demands one resource places on another). It knows nothing about
// lifecycles or task execution.

mod attribute;
mod multiplicity;
mod reference;
mod requirement;
mod schema;
mod value;

pub use attribute::{AttrDefault, AttributeSchema, DefaultFn, ReverseSpec};
pub use multiplicity::Multiplicity;
pub use reference::{RefTarget, Reference};
pub use requirement::{Property, Requirement, RequirementList, Scope};
pub use schema::{ClassSchema, SchemaRegistry};
pub use value::{AttrType, ResourceId, Value};

use std::collections::BTreeSet;

/// Read-only view of a resource instance, as seen by the model layer.
///
/// Requirement checks and computed defaults need to look at attribute
/// values of live resources without depending on the engine crate; the
/// engine's resource type implements this trait.
pub trait AttrSource {
    /// Current value of an attribute, `None` when unset and defaultless
    fn attr(&self, name: &str) -> Option<Value>;

    /// Capability tags declared by the resource's type
    fn capabilities(&self) -> BTreeSet<String>;

    /// Human-readable identity used in error attribution
    fn display_name(&self) -> String;
}
