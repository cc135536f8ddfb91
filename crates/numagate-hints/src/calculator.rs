//! Hint calculation — candidate NUMA subset enumeration.
//!
//! Enumerates every non-empty subset of the topology's NUMA nodes in
//! increasing-size order and keeps the subsets that satisfy capacity,
//! exclusivity, and single-socket locality. Per-subset infeasibility is a
//! soft skip; a topology lookup failure or a node missing from the
//! snapshot fails the whole calculation.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use numagate_machine::{AllocationEntry, CpuSet, CpuTopology, MachineState, annotations};

use crate::error::{HintError, HintResult};
use crate::request::TopologyHint;

/// Compute the full ordered collection of candidate hints for a request.
///
/// `reserved` is the machine-wide reserved CPU set, excluded from every
/// node's available capacity.
pub fn calculate_hints(
    cpu_request: u32,
    topology: &CpuTopology,
    machine_state: &MachineState,
    reserved: &CpuSet,
    request_annotations: &BTreeMap<String, String>,
) -> HintResult<Vec<TopologyHint>> {
    let numa_ids = topology.numa_ids();
    let min_nodes = topology.min_numa_nodes_to_fit(cpu_request)? as usize;

    let binding = annotations::numa_binding(request_annotations);
    let exclusive = annotations::numa_exclusive(request_annotations);

    // Memory cannot be partitioned precisely enough across nodes for a
    // shared allocation, so a NUMA-bound non-exclusive request must fit
    // within a single node.
    if binding && !exclusive && min_nodes > 1 {
        return Err(HintError::BindingSpansNodes {
            min_nodes: min_nodes as u32,
        });
    }

    let numas_per_socket = topology.numas_per_socket()? as usize;

    let mut hints = Vec::new();
    for size in min_nodes..=numa_ids.len() {
        if binding && !exclusive && size > 1 {
            break;
        }
        for mask in Combinations::new(&numa_ids, size) {
            if let Some(hint) = evaluate_mask(
                &mask,
                cpu_request,
                topology,
                machine_state,
                reserved,
                exclusive,
                min_nodes,
                numas_per_socket,
            )? {
                hints.push(hint);
            }
        }
    }

    debug!(
        requested = cpu_request,
        min_nodes,
        candidates = hints.len(),
        "calculated topology hints"
    );
    Ok(hints)
}

#[allow(clippy::too_many_arguments)]
fn evaluate_mask(
    mask: &[u32],
    cpu_request: u32,
    topology: &CpuTopology,
    machine_state: &MachineState,
    reserved: &CpuSet,
    exclusive: bool,
    min_nodes: usize,
    numas_per_socket: usize,
) -> HintResult<Option<TopologyHint>> {
    let mut available = CpuSet::new();
    for &numa in mask {
        let node = machine_state
            .node(numa)
            .ok_or(HintError::MissingNumaState(numa))?;
        if exclusive && !node.allocated.is_empty() {
            debug!(
                numa,
                allocated = node.allocated.size(),
                "exclusive request skips mask containing an allocated node"
            );
            return Ok(None);
        }
        available = available.union(&node.available(reserved));
    }

    if available.size() < cpu_request as usize {
        debug!(
            mask = ?mask,
            available = available.size(),
            requested = cpu_request,
            "mask lacks capacity"
        );
        return Ok(None);
    }

    // Prefer single-socket locality whenever the requirement could be
    // satisfied within one socket. Larger masks necessarily cross.
    if mask.len() <= numas_per_socket && topology.crosses_sockets(mask)? {
        debug!(mask = ?mask, numas_per_socket, "mask crosses sockets needlessly");
        return Ok(None);
    }

    Ok(Some(TopologyHint {
        nodes: mask.to_vec(),
        preferred: mask.len() == min_nodes,
    }))
}

/// Rebuild the hint for a container that already holds an allocation.
///
/// Returns `None` when the record is stale (allocation size no longer
/// matches the request, or no per-node assignment was recorded); the
/// caller then drops the record and recomputes.
pub fn regenerate_hints(entry: &AllocationEntry, cpu_request: u32) -> Option<Vec<TopologyHint>> {
    if entry.allocated.size() != cpu_request as usize {
        warn!(
            pod = %entry.pod_name,
            container = %entry.container_name,
            allocated = entry.allocated.size(),
            requested = cpu_request,
            "allocation record does not match the requested cpu count"
        );
        return None;
    }
    if entry.numa_assignments.is_empty() {
        warn!(
            pod = %entry.pod_name,
            container = %entry.container_name,
            "allocation record carries no NUMA assignments"
        );
        return None;
    }

    let nodes: Vec<u32> = entry.numa_assignments.keys().copied().collect();
    Some(vec![TopologyHint {
        nodes,
        preferred: true,
    }])
}

/// Iterator over all k-element subsets of `items`, in lexicographic
/// order of positions.
struct Combinations<'a> {
    items: &'a [u32],
    indices: Vec<usize>,
    done: bool,
}

impl<'a> Combinations<'a> {
    fn new(items: &'a [u32], k: usize) -> Self {
        Self {
            items,
            indices: (0..k).collect(),
            done: k == 0 || k > items.len(),
        }
    }
}

impl Iterator for Combinations<'_> {
    type Item = Vec<u32>;

    fn next(&mut self) -> Option<Vec<u32>> {
        if self.done {
            return None;
        }
        let current: Vec<u32> = self.indices.iter().map(|&i| self.items[i]).collect();

        let k = self.indices.len();
        let n = self.items.len();
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.indices[i] != i + n - k {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                break;
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numagate_machine::annotations::{
        ANNOTATION_ENABLED, ANNOTATION_NUMA_BINDING, ANNOTATION_NUMA_EXCLUSIVE,
    };
    use numagate_machine::{ContainerType, MachineError, NumaNodeState, PodEntries};

    /// `sockets` lists per-socket NUMA IDs; every node gets 4 CPUs.
    fn topology(sockets: &[&[u32]]) -> CpuTopology {
        let socket_to_numas: BTreeMap<u32, Vec<u32>> = sockets
            .iter()
            .enumerate()
            .map(|(socket, numas)| (socket as u32, numas.to_vec()))
            .collect();
        let numa_to_cpus: BTreeMap<u32, CpuSet> = sockets
            .iter()
            .flat_map(|numas| numas.iter())
            .map(|&numa| (numa, (numa * 4..numa * 4 + 4).collect()))
            .collect();
        CpuTopology::new(socket_to_numas, numa_to_cpus).unwrap()
    }

    fn empty_state(topology: &CpuTopology) -> MachineState {
        MachineState::from_pod_entries(topology, &PodEntries::new()).unwrap()
    }

    fn state_with_allocation(topology: &CpuTopology, numa: u32, cpus: CpuSet) -> MachineState {
        let entry = AllocationEntry {
            pod_uid: "u1".to_string(),
            pod_namespace: "default".to_string(),
            pod_name: "resident".to_string(),
            container_name: "main".to_string(),
            container_type: ContainerType::Main,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            allocated: cpus.clone(),
            numa_assignments: BTreeMap::from([(numa, cpus)]),
        };
        let mut entries = PodEntries::new();
        entries
            .entry("u1".to_string())
            .or_default()
            .insert("main".to_string(), entry);
        MachineState::from_pod_entries(topology, &entries).unwrap()
    }

    fn binding_annotations(exclusive: bool) -> BTreeMap<String, String> {
        let mut annotations = BTreeMap::from([(
            ANNOTATION_NUMA_BINDING.to_string(),
            ANNOTATION_ENABLED.to_string(),
        )]);
        if exclusive {
            annotations.insert(
                ANNOTATION_NUMA_EXCLUSIVE.to_string(),
                ANNOTATION_ENABLED.to_string(),
            );
        }
        annotations
    }

    #[test]
    fn every_hint_has_enough_capacity() {
        let topo = topology(&[&[0, 1], &[2, 3]]);
        let state = empty_state(&topo);
        let hints =
            calculate_hints(6, &topo, &state, &CpuSet::new(), &BTreeMap::new()).unwrap();

        assert!(!hints.is_empty());
        for hint in &hints {
            let capacity: usize = hint
                .nodes
                .iter()
                .map(|&n| state.node(n).unwrap().available(&CpuSet::new()).size())
                .sum();
            assert!(capacity >= 6, "hint {:?} lacks capacity", hint.nodes);
        }
    }

    #[test]
    fn preferred_iff_minimal_size() {
        let topo = topology(&[&[0, 1], &[2, 3]]);
        let state = empty_state(&topo);
        // 6 CPUs needs 2 nodes.
        let hints =
            calculate_hints(6, &topo, &state, &CpuSet::new(), &BTreeMap::new()).unwrap();

        for hint in &hints {
            assert_eq!(hint.preferred, hint.nodes.len() == 2, "hint {:?}", hint.nodes);
        }
        assert!(hints.iter().any(|h| h.preferred));
    }

    #[test]
    fn small_masks_may_not_cross_sockets() {
        let topo = topology(&[&[0, 1], &[2, 3]]);
        let state = empty_state(&topo);
        let hints =
            calculate_hints(6, &topo, &state, &CpuSet::new(), &BTreeMap::new()).unwrap();

        // 2-node masks (<= 2 numas per socket) must stay on one socket;
        // 3- and 4-node masks necessarily cross and are allowed.
        let pairs: Vec<_> = hints.iter().filter(|h| h.nodes.len() == 2).collect();
        assert_eq!(pairs.len(), 2);
        for hint in pairs {
            assert!(!topo.crosses_sockets(&hint.nodes).unwrap());
        }
        assert!(hints.iter().any(|h| h.nodes.len() == 3));
    }

    #[test]
    fn exclusive_request_skips_allocated_nodes() {
        let topo = topology(&[&[0, 1], &[2, 3]]);
        let state = state_with_allocation(&topo, 0, [0, 1].into_iter().collect());
        let hints =
            calculate_hints(4, &topo, &state, &CpuSet::new(), &binding_annotations(true))
                .unwrap();

        assert!(!hints.is_empty());
        for hint in &hints {
            assert!(!hint.nodes.contains(&0), "hint {:?} uses allocated node", hint.nodes);
        }
    }

    #[test]
    fn non_exclusive_binding_must_fit_one_node() {
        let topo = topology(&[&[0, 1], &[2, 3]]);
        let state = empty_state(&topo);
        // 6 CPUs needs 2 nodes, which a bound non-exclusive request may not span.
        let err = calculate_hints(6, &topo, &state, &CpuSet::new(), &binding_annotations(false));
        assert!(matches!(
            err,
            Err(HintError::BindingSpansNodes { min_nodes: 2 })
        ));
    }

    #[test]
    fn bound_non_exclusive_request_gets_single_node_hints_only() {
        // Single socket, 2 nodes, 4 CPUs each; request 4, binding, no exclusivity.
        let topo = topology(&[&[0, 1]]);
        let state = empty_state(&topo);
        let hints =
            calculate_hints(4, &topo, &state, &CpuSet::new(), &binding_annotations(false))
                .unwrap();

        assert_eq!(hints.len(), 2);
        for hint in &hints {
            assert_eq!(hint.nodes.len(), 1);
            assert!(hint.preferred);
        }
    }

    #[test]
    fn reserved_cpus_reduce_capacity() {
        let topo = topology(&[&[0, 1]]);
        let state = empty_state(&topo);
        // Reserve node 0 entirely: a 4-CPU single-node request fits node 1 only.
        let reserved: CpuSet = (0..4).collect();
        let hints =
            calculate_hints(4, &topo, &state, &reserved, &binding_annotations(false)).unwrap();

        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].nodes, vec![1]);
    }

    #[test]
    fn unsatisfiable_request_is_an_error() {
        let topo = topology(&[&[0, 1]]);
        let state = empty_state(&topo);
        let err = calculate_hints(64, &topo, &state, &CpuSet::new(), &BTreeMap::new());
        assert!(matches!(
            err,
            Err(HintError::Machine(MachineError::CpuRequestTooLarge { .. }))
        ));
    }

    #[test]
    fn missing_node_state_is_fatal() {
        let topo = topology(&[&[0, 1]]);
        // Snapshot only knows node 0.
        let state = MachineState::new(BTreeMap::from([(
            0,
            NumaNodeState {
                total: (0..4).collect(),
                ..NumaNodeState::default()
            },
        )]));
        // Node 1 is in the topology but absent from the snapshot; any
        // mask touching it must abort the calculation.
        let err = calculate_hints(8, &topo, &state, &CpuSet::new(), &BTreeMap::new());
        assert!(matches!(err, Err(HintError::MissingNumaState(_))));
    }

    #[test]
    fn identical_inputs_give_identical_hints() {
        let topo = topology(&[&[0, 1], &[2, 3]]);
        let state = empty_state(&topo);
        let a = calculate_hints(6, &topo, &state, &CpuSet::new(), &BTreeMap::new()).unwrap();
        let b = calculate_hints(6, &topo, &state, &CpuSet::new(), &BTreeMap::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn regenerate_matches_existing_allocation() {
        let entry = AllocationEntry {
            pod_uid: "u1".to_string(),
            pod_namespace: "default".to_string(),
            pod_name: "api".to_string(),
            container_name: "main".to_string(),
            container_type: ContainerType::Main,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            allocated: (0..4).collect(),
            numa_assignments: BTreeMap::from([(0, (0..4).collect())]),
        };

        let hints = regenerate_hints(&entry, 4).unwrap();
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].nodes, vec![0]);
        assert!(hints[0].preferred);

        // Changed request size makes the record stale.
        assert!(regenerate_hints(&entry, 8).is_none());
    }

    #[test]
    fn combinations_enumerate_k_subsets() {
        let items = [0u32, 1, 2, 3];
        let pairs: Vec<Vec<u32>> = Combinations::new(&items, 2).collect();
        assert_eq!(
            pairs,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );

        let all: Vec<Vec<u32>> = Combinations::new(&items, 4).collect();
        assert_eq!(all, vec![vec![0, 1, 2, 3]]);

        assert_eq!(Combinations::new(&items, 0).count(), 0);
        assert_eq!(Combinations::new(&items, 5).count(), 0);
    }
}
