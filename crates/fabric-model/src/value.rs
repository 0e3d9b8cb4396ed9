// Dynamic values and attribute types
//
// Resources store attribute values as `Value`, a small dynamic type.
// Cross-resource pointers are stored as `Value::Resource(ResourceId)`
// (a UUID indirection resolved through the registry, never a live
// reference) so cyclic relational graphs stay expressible.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reference::Reference;

/// Stable identity of a resource instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(Uuid);

impl ResourceId {
    pub fn new() -> Self {
        ResourceId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for log attribution
        let s = self.0.to_string();
        write!(f, "{}", &s[..8])
    }
}

/// Runtime value of an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// UUID indirection to another resource
    Resource(ResourceId),
    /// Deferred pointer to another resource's attribute
    Reference(Reference),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Resource(_) => "resource",
            Value::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<ResourceId> {
        match self {
            Value::Resource(id) => Some(*id),
            _ => None,
        }
    }

    /// Render for command-template substitution and error messages
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::render)
                .collect::<Vec<_>>()
                .join(" "),
            Value::Map(map) => format!("{:?}", map),
            Value::Resource(id) => id.to_string(),
            Value::Reference(r) => format!("{}", r),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ResourceId> for Value {
    fn from(id: ResourceId) -> Self {
        Value::Resource(id)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Declared type of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrType {
    Bool,
    Integer,
    String,
    Map,
    /// Relation to instances of a named class
    Class(String),
    /// Relation to instances of the declaring class itself
    SelfClass,
}

impl AttrType {
    pub fn is_relation(&self) -> bool {
        matches!(self, AttrType::Class(_) | AttrType::SelfClass)
    }

    /// Shallow type check of a concrete value.
    ///
    /// Null, references and UUID indirections are accepted for relations;
    /// class compatibility of the pointed-to resource is the registry's
    /// concern, not a value-level one.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (_, Value::Reference(_)) => true,
            (AttrType::Bool, Value::Bool(_)) => true,
            (AttrType::Integer, Value::Integer(_)) => true,
            (AttrType::String, Value::String(_)) => true,
            (AttrType::Map, Value::Map(_)) => true,
            (AttrType::Class(_) | AttrType::SelfClass, Value::Resource(_)) => true,
            (_, Value::List(items)) => items.iter().all(|v| self.accepts(v)),
            _ => false,
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Bool => write!(f, "bool"),
            AttrType::Integer => write!(f, "integer"),
            AttrType::String => write!(f, "string"),
            AttrType::Map => write!(f, "map"),
            AttrType::Class(name) => write!(f, "{}", name),
            AttrType::SelfClass => write!(f, "Self"),
        }
    }
}
