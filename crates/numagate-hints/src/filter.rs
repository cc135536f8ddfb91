//! Inter-pod affinity filtering of candidate hints.
//!
//! `pre_pod_affinity_filter` assembles the transient `PreFilterState` for
//! one computation; `pod_affinity_filter` then drops every candidate
//! whose member nodes violate any constraint. A hint is rejected whole —
//! partial satisfaction across its subset is not acceptable.

use tracing::debug;

use numagate_machine::{CpuTopology, MachineState, PodAffinity};

use crate::affinity::{
    NumaAffinityInfo, PodAffinityInfo, TopologyAffinityCount, affinity_counts,
    anti_affinity_counts, collect_numa_affinity_info, existing_anti_affinity_counts,
    required_pod_affinity_info,
};
use crate::error::{HintError, HintResult};
use crate::request::{ResourceRequest, TopologyHint};

/// Transient aggregate for one filter pass.
#[derive(Debug, Clone)]
pub struct PreFilterState {
    pub numa_affinity_info: Vec<NumaAffinityInfo>,
    pub pod_affinity_info: PodAffinityInfo,
    /// Residents' anti-affinity matched against the new pod.
    pub existing_anti_affinity_counts: TopologyAffinityCount,
    /// The new pod's anti-affinity matched against residents.
    pub anti_affinity_counts: TopologyAffinityCount,
    /// The new pod's affinity matched against residents.
    pub affinity_counts: TopologyAffinityCount,
}

/// Assemble the filter state for a request.
///
/// Exclusive requests skip inter-pod filtering entirely: they cannot
/// share a node, so affinity against residents is moot. `Ok(None)` tells
/// the caller to use the calculator's output unfiltered. An exclusive
/// request that still declares required affinity is a policy error.
pub fn pre_pod_affinity_filter(
    req: &ResourceRequest,
    topology: &CpuTopology,
    machine_state: &MachineState,
) -> HintResult<Option<PreFilterState>> {
    let pod_affinity = PodAffinity::from_annotations(&req.annotations)?;

    if req.numa_exclusive() {
        if pod_affinity.affinity.is_some() {
            return Err(HintError::ExclusiveWithAffinity);
        }
        return Ok(None);
    }

    let numa_affinity_info = collect_numa_affinity_info(topology, machine_state)?;
    let pod_affinity_info = required_pod_affinity_info(&pod_affinity, req);

    let existing = existing_anti_affinity_counts(&numa_affinity_info, &pod_affinity_info);
    let anti = anti_affinity_counts(&numa_affinity_info, &pod_affinity_info);
    let affinity = affinity_counts(&numa_affinity_info, &pod_affinity_info);

    Ok(Some(PreFilterState {
        numa_affinity_info,
        pod_affinity_info,
        existing_anti_affinity_counts: existing,
        anti_affinity_counts: anti,
        affinity_counts: affinity,
    }))
}

/// Whether every member node of `hint` satisfies all constraints.
pub fn hint_allowed(state: &PreFilterState, hint: &TopologyHint) -> bool {
    hint.nodes.iter().all(|&numa| {
        state.existing_anti_affinity_counts.get(numa) == 0
            && state.anti_affinity_counts.get(numa) == 0
            && (state.pod_affinity_info.affinity_required.is_empty()
                || state.affinity_counts.get(numa) > 0)
    })
}

/// Retain only the hints satisfying the filter state.
pub fn pod_affinity_filter(state: &PreFilterState, hints: Vec<TopologyHint>) -> Vec<TopologyHint> {
    hints
        .into_iter()
        .filter(|hint| {
            let allowed = hint_allowed(state, hint);
            if !allowed {
                debug!(nodes = ?hint.nodes, "hint rejected by inter-pod affinity");
            }
            allowed
        })
        .collect()
}
