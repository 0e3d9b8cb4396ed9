// Requirement engine
//
// A requirement is a demand of the form "the resource filling attribute
// slot X must have properties P and capabilities C". Requirements are
// evaluated lazily against whatever resource currently occupies the
// slot, so they serve both as a selection filter during resolution and
// as a post-hoc validator once the dependency is wired.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use fabric_error::{RequirementError, RequirementResult};

use crate::value::Value;
use crate::AttrSource;

/// Resolution scope of a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Check the one candidate already wired by attribute reference
    Instance,
    /// Search all registered instances of a compatible class
    Class,
}

/// A non-empty ANY_OF value set: satisfied when the observed value is a
/// member. Intersecting two properties can legitimately produce an empty
/// set, which no value satisfies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    values: Vec<Value>,
}

impl Property {
    pub fn any_of(values: impl IntoIterator<Item = Value>) -> Self {
        Property {
            values: values.into_iter().collect(),
        }
    }

    pub fn one(value: impl Into<Value>) -> Self {
        Property {
            values: vec![value.into()],
        }
    }

    pub fn satisfied_by(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Keep only values present in both sets
    pub fn intersect(&mut self, other: &Property) {
        self.values.retain(|v| other.values.contains(v));
    }
}

/// A demand placed on the resource occupying an attribute slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Name of the attribute slot this requirement targets
    attribute: String,
    /// Property name -> required value set on the candidate
    properties: BTreeMap<String, Property>,
    /// Capability tags the candidate's type must declare
    capabilities: BTreeSet<String>,
    pub scope: Scope,
    /// Abort the dependent resource's commit when unresolvable
    pub fatal: bool,
    /// Candidate must have settled before the dependent proceeds
    pub must_be_up: bool,
}

impl Requirement {
    pub fn new(attribute: impl Into<String>) -> Self {
        Requirement {
            attribute: attribute.into(),
            properties: BTreeMap::new(),
            capabilities: BTreeSet::new(),
            scope: Scope::Instance,
            fatal: true,
            must_be_up: false,
        }
    }

    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    pub fn capability(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.insert(tag.into());
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn must_be_up(mut self) -> Self {
        self.must_be_up = true;
        self
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn properties(&self) -> &BTreeMap<String, Property> {
        &self.properties
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Check a candidate resource against this requirement.
    ///
    /// Fails with `RequiredAttribute` when a checked property is absent
    /// on the candidate, `RequiredProperty` when present but outside the
    /// required set, `MissingCapability` when a capability tag is not
    /// declared.
    pub fn check(&self, candidate: &dyn AttrSource) -> RequirementResult<()> {
        for (name, property) in &self.properties {
            let value = candidate.attr(name).ok_or_else(|| {
                RequirementError::RequiredAttribute {
                    resource: candidate.display_name(),
                    attribute: name.clone(),
                }
            })?;
            if !property.satisfied_by(&value) {
                return Err(RequirementError::RequiredProperty {
                    resource: candidate.display_name(),
                    attribute: self.attribute.clone(),
                    property: name.clone(),
                    expected: format!("{:?}", property.values()),
                    actual: value.render(),
                });
            }
        }

        let declared = candidate.capabilities();
        for tag in &self.capabilities {
            if !declared.contains(tag) {
                return Err(RequirementError::MissingCapability {
                    resource: candidate.display_name(),
                    capability: tag.clone(),
                });
            }
        }

        Ok(())
    }

    /// Merge another requirement targeting the same attribute into this
    /// one: per-key property intersection for shared keys, union of
    /// unseen keys, union of capability sets.
    pub fn merge(&mut self, other: &Requirement) -> RequirementResult<()> {
        if self.attribute != other.attribute {
            return Err(RequirementError::MergeTargetMismatch {
                left: self.attribute.clone(),
                right: other.attribute.clone(),
            });
        }

        for (name, property) in &other.properties {
            match self.properties.get_mut(name) {
                Some(existing) => existing.intersect(property),
                None => {
                    self.properties.insert(name.clone(), property.clone());
                }
            }
        }

        self.capabilities
            .extend(other.capabilities.iter().cloned());
        self.fatal |= other.fatal;
        self.must_be_up |= other.must_be_up;

        Ok(())
    }
}

/// Ordered collection with at most one requirement per target attribute.
/// Pushing a requirement whose target already exists merges it into the
/// existing entry instead of appending a duplicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementList {
    entries: Vec<Requirement>,
}

impl RequirementList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, requirement: Requirement) -> RequirementResult<()> {
        match self
            .entries
            .iter_mut()
            .find(|r| r.attribute() == requirement.attribute())
        {
            Some(existing) => existing.merge(&requirement),
            None => {
                self.entries.push(requirement);
                Ok(())
            }
        }
    }

    /// Merge a whole list in, entry by entry
    pub fn extend(&mut self, other: &RequirementList) -> RequirementResult<()> {
        for requirement in &other.entries {
            self.push(requirement.clone())?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Requirement> for RequirementList {
    fn from_iter<I: IntoIterator<Item = Requirement>>(iter: I) -> Self {
        let mut list = RequirementList::new();
        for requirement in iter {
            // Merge failures cannot happen here: push only merges
            // same-target entries
            let _ = list.push(requirement);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    struct Candidate {
        os: &'static str,
        caps: Vec<&'static str>,
    }

    impl AttrSource for Candidate {
        fn attr(&self, name: &str) -> Option<Value> {
            match name {
                "os" => Some(Value::from(self.os)),
                _ => None,
            }
        }

        fn capabilities(&self) -> BTreeSet<String> {
            self.caps.iter().map(|s| s.to_string()).collect()
        }

        fn display_name(&self) -> String {
            "candidate".to_string()
        }
    }

    #[test]
    fn test_check_property_and_capability() {
        let req = Requirement::new("node")
            .property("os", Property::any_of([Value::from("ubuntu")]))
            .capability("vpp");

        let good = Candidate { os: "ubuntu", caps: vec!["vpp"] };
        assert!(req.check(&good).is_ok());

        let wrong_os = Candidate { os: "debian", caps: vec!["vpp"] };
        assert!(matches!(
            req.check(&wrong_os),
            Err(RequirementError::RequiredProperty { .. })
        ));

        let no_cap = Candidate { os: "ubuntu", caps: vec![] };
        assert!(matches!(
            req.check(&no_cap),
            Err(RequirementError::MissingCapability { .. })
        ));
    }

    #[test]
    fn test_check_missing_attribute() {
        let req = Requirement::new("node")
            .property("arch", Property::one("x86_64"));
        let candidate = Candidate { os: "ubuntu", caps: vec![] };
        assert!(matches!(
            req.check(&candidate),
            Err(RequirementError::RequiredAttribute { .. })
        ));
    }

    #[test]
    fn test_merge_target_mismatch_fails_loudly() {
        let mut a = Requirement::new("node");
        let b = Requirement::new("interface");
        assert!(matches!(
            a.merge(&b),
            Err(RequirementError::MergeTargetMismatch { .. })
        ));
    }

    #[test]
    fn test_merge_disjoint_properties_is_unsatisfiable() {
        let mut a = Requirement::new("node")
            .property("os", Property::any_of([Value::from("ubuntu")]));
        let b = Requirement::new("node")
            .property("os", Property::any_of([Value::from("debian")]));
        a.merge(&b).unwrap();

        let prop = &a.properties()["os"];
        assert!(prop.is_empty());
        // Every candidate value is now rejected
        assert!(!prop.satisfied_by(&Value::from("ubuntu")));
        assert!(!prop.satisfied_by(&Value::from("debian")));
    }

    #[test]
    fn test_merge_unions_unseen_keys_and_capabilities() {
        let mut a = Requirement::new("node")
            .property("os", Property::any_of([Value::from("ubuntu"), Value::from("debian")]))
            .capability("dns");
        let b = Requirement::new("node")
            .property("os", Property::any_of([Value::from("ubuntu")]))
            .property("arch", Property::one("arm64"))
            .capability("vpp");
        a.merge(&b).unwrap();

        assert_eq!(a.properties()["os"].values(), &[Value::from("ubuntu")]);
        assert_eq!(a.properties()["arch"].values(), &[Value::from("arm64")]);
        assert!(a.capabilities().contains("dns"));
        assert!(a.capabilities().contains("vpp"));
    }

    #[test]
    fn test_requirement_list_merges_per_target() {
        let mut list = RequirementList::new();
        let sets = [
            vec!["a", "b", "c"],
            vec!["b", "c", "d"],
            vec!["c", "d", "e"],
        ];
        for set in &sets {
            list.push(
                Requirement::new("node").property(
                    "os",
                    Property::any_of(set.iter().map(|s| Value::from(*s))),
                ),
            )
            .unwrap();
        }

        assert_eq!(list.len(), 1);
        let merged = list.iter().next().unwrap();
        // Intersection of the three input sets
        assert_eq!(merged.properties()["os"].values(), &[Value::from("c")]);
    }
}
