//! Affinity context collection and selector-match counting.
//!
//! For one filter pass the engine builds an affinity-context record per
//! NUMA node (socket, aggregated resident labels, resident anti-affinity
//! selectors) plus one for the requesting pod, then tallies selector
//! matches into `TopologyAffinityCount` maps. The per-node tallies are
//! independent, so they fan out across a rayon pool into one slot per
//! node and merge after the join.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use numagate_machine::annotations::ANNOTATION_ANTI_AFFINITY;
use numagate_machine::{CpuTopology, MachineState, PodAffinity, Selector, SelectorZone};

use crate::error::{HintError, HintResult};
use crate::request::ResourceRequest;

/// NUMA node ID → number of selector matches counted against it.
///
/// Counts are accumulated, never negative, and zero by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyAffinityCount(BTreeMap<u32, u32>);

impl TopologyAffinityCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, numa: u32) -> u32 {
        self.0.get(&numa).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, numa: u32) {
        *self.0.entry(numa).or_insert(0) += 1;
    }

    /// Key-wise sum of another count map into this one.
    pub fn merge(&mut self, other: &TopologyAffinityCount) {
        for (&numa, &count) in &other.0 {
            *self.0.entry(numa).or_insert(0) += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Affinity context of one NUMA node.
#[derive(Debug, Clone, PartialEq)]
pub struct NumaAffinityInfo {
    pub numa_id: u32,
    pub socket_id: u32,
    /// All NUMA nodes sharing this node's socket (including itself).
    pub socket_numas: Vec<u32>,
    /// Resident labels, key → distinct values seen across residents.
    pub labels: BTreeMap<String, Vec<String>>,
    /// Anti-affinity selectors declared by residents.
    pub anti_affinity_required: Vec<Selector>,
}

/// Affinity context of the requesting pod.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodAffinityInfo {
    pub labels: BTreeMap<String, String>,
    pub affinity_required: Vec<Selector>,
    pub anti_affinity_required: Vec<Selector>,
}

/// Build one affinity-context record per NUMA node, in node-ID order.
///
/// Labels are merged across every resident entry into a multi-valued
/// map. Anti-affinity selectors come from the first container entry of
/// each resident pod, taken as representative.
pub fn collect_numa_affinity_info(
    topology: &CpuTopology,
    machine_state: &MachineState,
) -> HintResult<Vec<NumaAffinityInfo>> {
    let mut infos = Vec::with_capacity(topology.num_numa_nodes());
    for numa in topology.numa_ids() {
        let socket = topology.socket_of_numa(numa)?;
        let socket_numas = topology.numas_in_socket(socket)?.to_vec();
        let node = machine_state
            .node(numa)
            .ok_or(HintError::MissingNumaState(numa))?;

        let mut labels: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut anti_affinity_required = Vec::new();
        for containers in node.pod_entries.values() {
            for entry in containers.values() {
                for (key, value) in &entry.labels {
                    let values = labels.entry(key.clone()).or_default();
                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
            }
            // The first container entry is representative for the pod's
            // anti-affinity; entries of one pod carry consistent
            // annotations.
            let Some(entry) = containers.values().next() else {
                continue;
            };
            if entry
                .annotations
                .get(ANNOTATION_ANTI_AFFINITY)
                .is_some_and(|v| !v.is_empty())
            {
                let pod_affinity = PodAffinity::from_annotations(&entry.annotations)?;
                if let Some(term) = pod_affinity.anti_affinity {
                    anti_affinity_required.extend(term.required);
                }
            }
        }

        infos.push(NumaAffinityInfo {
            numa_id: numa,
            socket_id: socket,
            socket_numas,
            labels,
            anti_affinity_required,
        });
    }
    Ok(infos)
}

/// Build the requesting pod's affinity context.
pub fn required_pod_affinity_info(
    pod_affinity: &PodAffinity,
    req: &ResourceRequest,
) -> PodAffinityInfo {
    PodAffinityInfo {
        labels: req.labels.clone(),
        affinity_required: pod_affinity
            .affinity
            .as_ref()
            .map(|t| t.required.clone())
            .unwrap_or_default(),
        anti_affinity_required: pod_affinity
            .anti_affinity
            .as_ref()
            .map(|t| t.required.clone())
            .unwrap_or_default(),
    }
}

/// Match a node's selectors against the new pod's single-valued labels.
pub fn match_numa_affinity(
    selectors: &[Selector],
    labels: &BTreeMap<String, String>,
    info: &NumaAffinityInfo,
) -> TopologyAffinityCount {
    let mut counts = TopologyAffinityCount::new();
    for selector in selectors {
        for (key, value) in &selector.match_labels {
            if labels.get(key) == Some(value) {
                count_match(&mut counts, selector.zone, info);
            }
        }
    }
    counts
}

/// Match the new pod's selectors against a node's multi-valued labels.
pub fn match_pod_affinity(
    selectors: &[Selector],
    labels: &BTreeMap<String, Vec<String>>,
    info: &NumaAffinityInfo,
) -> TopologyAffinityCount {
    let mut counts = TopologyAffinityCount::new();
    for selector in selectors {
        for (key, value) in &selector.match_labels {
            let Some(values) = labels.get(key) else {
                continue;
            };
            for node_value in values {
                if node_value == value {
                    count_match(&mut counts, selector.zone, info);
                }
            }
        }
    }
    counts
}

fn count_match(counts: &mut TopologyAffinityCount, zone: SelectorZone, info: &NumaAffinityInfo) {
    match zone {
        SelectorZone::Socket => {
            for &numa in &info.socket_numas {
                counts.increment(numa);
            }
        }
        SelectorZone::Numa => counts.increment(info.numa_id),
    }
}

/// Existing residents' anti-affinity selectors matched against the new
/// pod's labels, one parallel tally per node.
pub fn existing_anti_affinity_counts(
    infos: &[NumaAffinityInfo],
    pod: &PodAffinityInfo,
) -> TopologyAffinityCount {
    merge_all(
        infos
            .par_iter()
            .map(|info| match_numa_affinity(&info.anti_affinity_required, &pod.labels, info))
            .collect(),
    )
}

/// The new pod's anti-affinity selectors matched against resident labels.
pub fn anti_affinity_counts(
    infos: &[NumaAffinityInfo],
    pod: &PodAffinityInfo,
) -> TopologyAffinityCount {
    merge_all(
        infos
            .par_iter()
            .map(|info| match_pod_affinity(&pod.anti_affinity_required, &info.labels, info))
            .collect(),
    )
}

/// The new pod's affinity selectors matched against resident labels.
pub fn affinity_counts(
    infos: &[NumaAffinityInfo],
    pod: &PodAffinityInfo,
) -> TopologyAffinityCount {
    merge_all(
        infos
            .par_iter()
            .map(|info| match_pod_affinity(&pod.affinity_required, &info.labels, info))
            .collect(),
    )
}

fn merge_all(per_node: Vec<TopologyAffinityCount>) -> TopologyAffinityCount {
    let mut total = TopologyAffinityCount::new();
    for counts in &per_node {
        total.merge(counts);
    }
    total
}
