//! Strategy dispatch and the full hint pipeline.
//!
//! A request is routed by its QoS class and NUMA-binding annotation:
//! shared and reclaimed workloads get no NUMA preference, dedicated
//! cores without binding are unsupported, and dedicated bound primary
//! containers run the full pipeline — regenerate from an existing
//! allocation, consult the extra-state override, calculate fresh, then
//! apply the inter-pod affinity filter.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use numagate_machine::{
    AllocationEntry, ContainerType, CpuSet, CpuTopology, MachineState, PodEntries, QosClass,
};

use crate::calculator::{calculate_hints, regenerate_hints};
use crate::config::HintEngineConfig;
use crate::error::{HintError, HintResult};
use crate::extra_state::hints_from_extra_state_file;
use crate::filter::{pod_affinity_filter, pre_pod_affinity_filter};
use crate::request::{HintsResponse, RESOURCE_CPU, ResourceRequest, pack_hints_response};

/// The hint strategy a request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintStrategy {
    Shared,
    Reclaimed,
    DedicatedBound,
    DedicatedUnbound,
}

impl HintStrategy {
    pub fn for_request(req: &ResourceRequest) -> HintResult<Self> {
        Ok(match req.qos_class()? {
            QosClass::Shared => Self::Shared,
            QosClass::Reclaimed => Self::Reclaimed,
            QosClass::Dedicated if req.numa_binding() => Self::DedicatedBound,
            QosClass::Dedicated => Self::DedicatedUnbound,
        })
    }
}

/// Accessor for the caller-owned allocation state.
///
/// Implementations return consistent snapshots; the engine never mutates
/// what they hand out except for the locally cloned pod-entry mapping in
/// the stale-record fallback.
pub trait MachineStateSource: Send + Sync {
    /// Current per-NUMA-node allocation snapshot.
    fn machine_state(&self) -> MachineState;

    /// All allocation entries, pod UID → container → entry.
    fn pod_entries(&self) -> PodEntries;

    /// The recorded allocation for one container, if any.
    fn allocation(&self, pod_uid: &str, container_name: &str) -> Option<AllocationEntry>;
}

/// Computes topology hints for admission requests.
pub struct HintEngine {
    topology: Arc<CpuTopology>,
    state: Arc<dyn MachineStateSource>,
    reserved: CpuSet,
    extra_state_file: Option<PathBuf>,
}

impl HintEngine {
    pub fn new(
        topology: Arc<CpuTopology>,
        state: Arc<dyn MachineStateSource>,
        config: HintEngineConfig,
    ) -> Self {
        Self {
            topology,
            state,
            reserved: config.reserved_cpus,
            extra_state_file: config.extra_state_file,
        }
    }

    /// Compute the CPU topology hints for one request.
    ///
    /// Any error means admission failure for the container; no hints are
    /// emitted alongside it.
    pub fn topology_hints(&self, req: &ResourceRequest) -> HintResult<HintsResponse> {
        if req.pod_uid.is_empty() || req.container_name.is_empty() {
            return Err(HintError::InvalidRequest(
                "empty pod uid or container name".to_string(),
            ));
        }

        match HintStrategy::for_request(req)? {
            HintStrategy::Shared | HintStrategy::Reclaimed => {
                Ok(pack_hints_response(req, RESOURCE_CPU, None))
            }
            HintStrategy::DedicatedUnbound => Err(HintError::NotSupported(
                "dedicated cores without NUMA binding".to_string(),
            )),
            HintStrategy::DedicatedBound => self.dedicated_bound_hints(req),
        }
    }

    fn dedicated_bound_hints(&self, req: &ResourceRequest) -> HintResult<HintsResponse> {
        // A sidecar inherits its main container's cpuset, so it carries
        // no NUMA preference of its own.
        if req.container_type == ContainerType::Sidecar {
            return Ok(pack_hints_response(req, RESOURCE_CPU, None));
        }

        if req.cpu_request == 0 {
            return Err(HintError::InvalidRequest("zero cpu request".to_string()));
        }

        let mut machine_state = self.state.machine_state();
        let mut hints = None;

        if let Some(entry) = self.state.allocation(&req.pod_uid, &req.container_name) {
            hints = regenerate_hints(&entry, req.cpu_request);
            if hints.is_none() {
                // One-shot invalidation: drop the stale record from a
                // local copy of the entries and rebuild the snapshot.
                let mut entries = self.state.pod_entries();
                if let Some(containers) = entries.get_mut(&req.pod_uid) {
                    containers.remove(&req.container_name);
                    if containers.is_empty() {
                        entries.remove(&req.pod_uid);
                    }
                }
                machine_state = MachineState::from_pod_entries(&self.topology, &entries)?;
                warn!(
                    pod = %req.pod_name,
                    container = %req.container_name,
                    "dropped stale allocation record and recomputed machine state"
                );
            }
        }

        if hints.is_none()
            && let Some(path) = &self.extra_state_file
        {
            let bindable = machine_state.filtered_numa_set(AllocationEntry::numa_binding);
            match hints_from_extra_state_file(path, &req.pod_name, RESOURCE_CPU, &bindable) {
                Ok(Some(extra)) => {
                    info!(
                        pod = %req.pod_name,
                        hints = extra.len(),
                        "using hints from extra state file"
                    );
                    hints = Some(extra);
                }
                Ok(None) => {}
                Err(e) => info!(pod = %req.pod_name, error = %e, "extra state lookup failed"),
            }
        }

        let hints = match hints {
            Some(hints) => hints,
            None => calculate_hints(
                req.cpu_request,
                &self.topology,
                &machine_state,
                &self.reserved,
                &req.annotations,
            )?,
        };

        let hints = match pre_pod_affinity_filter(req, &self.topology, &machine_state)? {
            None => hints,
            Some(state) => pod_affinity_filter(&state, hints),
        };

        Ok(pack_hints_response(req, RESOURCE_CPU, Some(hints)))
    }
}
