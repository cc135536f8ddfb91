//! Per-NUMA-node allocation state.
//!
//! `MachineState` is the read-only snapshot a hint computation works
//! against: one `NumaNodeState` per NUMA node, each carrying the node's
//! total and allocated CPU sets plus the allocation entries resident on
//! it. Snapshots are supplied by the caller; a stale snapshot is
//! regenerated externally (or via `MachineState::from_pod_entries`) and
//! re-supplied, never patched in place.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::annotations;
use crate::cpuset::CpuSet;
use crate::error::{MachineError, MachineResult};
use crate::topology::CpuTopology;

/// Pod UID → container name → allocation entry.
pub type PodEntries = BTreeMap<String, BTreeMap<String, AllocationEntry>>;

/// Whether a container is the pod's primary workload or a sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    Main,
    Sidecar,
}

/// One committed allocation: a container's CPUs and where they live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub pod_uid: String,
    pub pod_namespace: String,
    pub pod_name: String,
    pub container_name: String,
    pub container_type: ContainerType,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// All CPUs held by this allocation.
    pub allocated: CpuSet,
    /// Per-NUMA-node slice of the allocation.
    pub numa_assignments: BTreeMap<u32, CpuSet>,
}

impl AllocationEntry {
    pub fn numa_binding(&self) -> bool {
        annotations::numa_binding(&self.annotations)
    }
}

/// Allocation state of a single NUMA node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumaNodeState {
    /// Every CPU belonging to this node.
    pub total: CpuSet,
    /// CPUs currently held by allocations on this node.
    pub allocated: CpuSet,
    /// Allocation entries resident on this node.
    pub pod_entries: PodEntries,
}

impl NumaNodeState {
    /// CPUs usable by a new allocation: total minus allocated minus the
    /// machine-wide reserved set.
    pub fn available(&self, reserved: &CpuSet) -> CpuSet {
        self.total.difference(&self.allocated).difference(reserved)
    }
}

/// Snapshot of all NUMA nodes, keyed by node ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineState(BTreeMap<u32, NumaNodeState>);

impl MachineState {
    pub fn new(nodes: BTreeMap<u32, NumaNodeState>) -> Self {
        Self(nodes)
    }

    pub fn node(&self, numa: u32) -> Option<&NumaNodeState> {
        self.0.get(&numa)
    }

    /// NUMA node IDs present in the snapshot, ascending.
    pub fn numa_ids(&self) -> Vec<u32> {
        self.0.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &NumaNodeState)> {
        self.0.iter().map(|(&numa, node)| (numa, node))
    }

    /// NUMA nodes whose resident entries all satisfy `pred`.
    ///
    /// Nodes without residents are always included. Used to restrict
    /// override-file hints to the NUMA-bindable part of the machine.
    pub fn filtered_numa_set<F>(&self, pred: F) -> BTreeSet<u32>
    where
        F: Fn(&AllocationEntry) -> bool,
    {
        self.0
            .iter()
            .filter(|(_, node)| {
                node.pod_entries
                    .values()
                    .flat_map(BTreeMap::values)
                    .all(&pred)
            })
            .map(|(&numa, _)| numa)
            .collect()
    }

    /// Rebuild a snapshot from a pod-entry mapping.
    ///
    /// Each entry's per-node assignment is folded back onto the node's
    /// allocated set. Assignments referencing a node missing from the
    /// topology, or CPUs outside the node, indicate a corrupt entry set
    /// and fail the whole rebuild.
    pub fn from_pod_entries(topology: &CpuTopology, entries: &PodEntries) -> MachineResult<Self> {
        let mut nodes: BTreeMap<u32, NumaNodeState> = BTreeMap::new();
        for numa in topology.numa_ids() {
            nodes.insert(
                numa,
                NumaNodeState {
                    total: topology.cpus_in_numa(numa)?.clone(),
                    ..NumaNodeState::default()
                },
            );
        }

        for (pod_uid, containers) in entries {
            for (container_name, entry) in containers {
                for (&numa, cpus) in &entry.numa_assignments {
                    let node = nodes
                        .get_mut(&numa)
                        .ok_or(MachineError::UnknownNumaNode(numa))?;
                    if !cpus.is_subset_of(&node.total) {
                        return Err(MachineError::AllocationOutsideNode { numa });
                    }
                    node.allocated = node.allocated.union(cpus);
                    node.pod_entries
                        .entry(pod_uid.clone())
                        .or_default()
                        .insert(container_name.clone(), entry.clone());
                }
            }
        }

        Ok(Self(nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{ANNOTATION_ENABLED, ANNOTATION_NUMA_BINDING};

    fn topology() -> CpuTopology {
        let sockets = BTreeMap::from([(0, vec![0, 1])]);
        let cpus = BTreeMap::from([
            (0, (0..4).collect::<CpuSet>()),
            (1, (4..8).collect::<CpuSet>()),
        ]);
        CpuTopology::new(sockets, cpus).unwrap()
    }

    fn entry(pod_uid: &str, container: &str, numa: u32, cpus: CpuSet) -> AllocationEntry {
        AllocationEntry {
            pod_uid: pod_uid.to_string(),
            pod_namespace: "default".to_string(),
            pod_name: format!("pod-{pod_uid}"),
            container_name: container.to_string(),
            container_type: ContainerType::Main,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            allocated: cpus.clone(),
            numa_assignments: BTreeMap::from([(numa, cpus)]),
        }
    }

    fn entries_of(items: Vec<AllocationEntry>) -> PodEntries {
        let mut entries = PodEntries::new();
        for item in items {
            entries
                .entry(item.pod_uid.clone())
                .or_default()
                .insert(item.container_name.clone(), item);
        }
        entries
    }

    #[test]
    fn rebuild_distributes_allocations() {
        let topo = topology();
        let entries = entries_of(vec![entry("u1", "main", 0, [0, 1].into_iter().collect())]);

        let state = MachineState::from_pod_entries(&topo, &entries).unwrap();

        let node0 = state.node(0).unwrap();
        assert_eq!(node0.allocated.to_vec(), vec![0, 1]);
        assert_eq!(node0.available(&CpuSet::new()).to_vec(), vec![2, 3]);
        assert_eq!(node0.pod_entries.len(), 1);

        let node1 = state.node(1).unwrap();
        assert!(node1.allocated.is_empty());
        assert!(node1.pod_entries.is_empty());
    }

    #[test]
    fn rebuild_rejects_unknown_numa() {
        let topo = topology();
        let entries = entries_of(vec![entry("u1", "main", 7, [0].into_iter().collect())]);
        assert!(matches!(
            MachineState::from_pod_entries(&topo, &entries),
            Err(MachineError::UnknownNumaNode(7))
        ));
    }

    #[test]
    fn rebuild_rejects_cpus_outside_node() {
        let topo = topology();
        // CPU 6 belongs to node 1, not node 0.
        let entries = entries_of(vec![entry("u1", "main", 0, [0, 6].into_iter().collect())]);
        assert!(matches!(
            MachineState::from_pod_entries(&topo, &entries),
            Err(MachineError::AllocationOutsideNode { numa: 0 })
        ));
    }

    #[test]
    fn available_subtracts_reserved() {
        let topo = topology();
        let state = MachineState::from_pod_entries(&topo, &PodEntries::new()).unwrap();
        let reserved: CpuSet = [0].into_iter().collect();
        assert_eq!(
            state.node(0).unwrap().available(&reserved).to_vec(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn filtered_numa_set_excludes_nodes_with_failing_entries() {
        let topo = topology();
        let mut bound = entry("u1", "main", 0, [0].into_iter().collect());
        bound.annotations.insert(
            ANNOTATION_NUMA_BINDING.to_string(),
            ANNOTATION_ENABLED.to_string(),
        );
        let unbound = entry("u2", "main", 1, [4].into_iter().collect());

        let entries = entries_of(vec![bound, unbound]);
        let state = MachineState::from_pod_entries(&topo, &entries).unwrap();

        let bindable = state.filtered_numa_set(AllocationEntry::numa_binding);
        assert!(bindable.contains(&0));
        assert!(!bindable.contains(&1));
    }
}
