//! Request and response types for the hint engine.
//!
//! The wire transport lives outside this crate; these are the plain
//! structs it marshals into.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use numagate_machine::{ContainerType, MachineResult, QosClass, annotations};

/// Resource name for CPU hints.
pub const RESOURCE_CPU: &str = "cpu";

/// One container's admission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub pod_namespace: String,
    pub pod_name: String,
    pub pod_uid: String,
    pub container_name: String,
    pub container_type: ContainerType,
    /// Requested exclusive CPU count.
    pub cpu_request: u32,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl ResourceRequest {
    pub fn qos_class(&self) -> MachineResult<QosClass> {
        QosClass::from_annotations(&self.annotations)
    }

    pub fn numa_binding(&self) -> bool {
        annotations::numa_binding(&self.annotations)
    }

    pub fn numa_exclusive(&self) -> bool {
        annotations::numa_exclusive(&self.annotations)
    }
}

/// A candidate NUMA-node subset.
///
/// `preferred` is true iff the subset size equals the minimum number of
/// nodes able to satisfy the requested CPU count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyHint {
    /// Member NUMA node IDs, ascending.
    pub nodes: Vec<u32>,
    pub preferred: bool,
}

/// Per-resource hint lists. `None` signals "no NUMA preference" — the
/// caller decides freely.
pub type ResourceHints = HashMap<String, Option<Vec<TopologyHint>>>;

/// The engine's answer for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintsResponse {
    pub pod_namespace: String,
    pub pod_name: String,
    pub pod_uid: String,
    pub container_name: String,
    pub resource_hints: ResourceHints,
}

/// Build a response carrying hints for a single resource.
pub fn pack_hints_response(
    req: &ResourceRequest,
    resource: &str,
    hints: Option<Vec<TopologyHint>>,
) -> HintsResponse {
    let mut resource_hints = ResourceHints::new();
    resource_hints.insert(resource.to_string(), hints);
    HintsResponse {
        pod_namespace: req.pod_namespace.clone(),
        pod_name: req.pod_name.clone(),
        pod_uid: req.pod_uid.clone(),
        container_name: req.container_name.clone(),
        resource_hints,
    }
}
