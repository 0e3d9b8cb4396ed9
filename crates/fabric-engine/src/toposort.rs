// Dependency-order scheduling
//
// Kahn's algorithm over the relation edges of committed resources.
// Resources with no unprocessed dependencies form a wave and are
// processed concurrently; commit order breaks ties inside a wave so
// runs are reproducible.

use std::collections::{BTreeSet, HashMap};

use fabric_error::{EngineError, EngineResult};
use fabric_model::ResourceId;

/// Topologically sort `order` (commit order) against `deps`
/// (resource -> resources it depends on). Edges pointing outside
/// `order` are ignored. Returns waves of mutually independent
/// resources; within a wave, commit order is preserved.
pub fn waves(
    order: &[ResourceId],
    deps: &HashMap<ResourceId, BTreeSet<ResourceId>>,
    labels: &HashMap<ResourceId, String>,
) -> EngineResult<Vec<Vec<ResourceId>>> {
    let members: BTreeSet<ResourceId> = order.iter().copied().collect();
    let mut remaining: HashMap<ResourceId, BTreeSet<ResourceId>> = order
        .iter()
        .map(|id| {
            let ds = deps
                .get(id)
                .map(|ds| ds.iter().copied().filter(|d| members.contains(d)).collect())
                .unwrap_or_default();
            (*id, ds)
        })
        .collect();

    let mut waves = Vec::new();
    let mut done: BTreeSet<ResourceId> = BTreeSet::new();
    while done.len() < order.len() {
        let wave: Vec<ResourceId> = order
            .iter()
            .copied()
            .filter(|id| !done.contains(id) && remaining[id].is_empty())
            .collect();
        if wave.is_empty() {
            // Whatever is left participates in at least one cycle
            let stuck: Vec<String> = order
                .iter()
                .filter(|id| !done.contains(id))
                .map(|id| labels.get(id).cloned().unwrap_or_else(|| id.to_string()))
                .collect();
            return Err(EngineError::DependencyCycle(stuck));
        }
        for id in &wave {
            done.insert(*id);
        }
        for ds in remaining.values_mut() {
            for id in &wave {
                ds.remove(id);
            }
        }
        waves.push(wave);
    }
    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ResourceId> {
        (0..n).map(|_| ResourceId::new()).collect()
    }

    #[test]
    fn test_waves_respect_dependencies() {
        let r = ids(3);
        // r2 depends on r1, r1 depends on r0
        let deps = HashMap::from([
            (r[1], BTreeSet::from([r[0]])),
            (r[2], BTreeSet::from([r[1]])),
        ]);
        let waves = waves(&r, &deps, &HashMap::new()).unwrap();
        assert_eq!(waves, vec![vec![r[0]], vec![r[1]], vec![r[2]]]);
    }

    #[test]
    fn test_independent_resources_share_a_wave_in_commit_order() {
        let r = ids(3);
        let deps = HashMap::from([(r[2], BTreeSet::from([r[0], r[1]]))]);
        let waves = waves(&r, &deps, &HashMap::new()).unwrap();
        assert_eq!(waves, vec![vec![r[0], r[1]], vec![r[2]]]);
    }

    #[test]
    fn test_cycle_reported_with_labels() {
        let r = ids(2);
        let deps = HashMap::from([
            (r[0], BTreeSet::from([r[1]])),
            (r[1], BTreeSet::from([r[0]])),
        ]);
        let labels = HashMap::from([
            (r[0], "vm 'a'".to_string()),
            (r[1], "vm 'b'".to_string()),
        ]);
        let err = waves(&r, &deps, &labels).unwrap_err();
        match err {
            EngineError::DependencyCycle(names) => {
                assert!(names.contains(&"vm 'a'".to_string()));
                assert!(names.contains(&"vm 'b'".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_edges_to_unknown_resources_ignored() {
        let r = ids(1);
        let outside = ResourceId::new();
        let deps = HashMap::from([(r[0], BTreeSet::from([outside]))]);
        let waves = waves(&r, &deps, &HashMap::new()).unwrap();
        assert_eq!(waves, vec![vec![r[0]]]);
    }
}
