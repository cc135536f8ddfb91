//! Annotation keys and the predicates derived from them.
//!
//! A request's QoS class, NUMA-binding flag, NUMA-exclusivity flag, and
//! inter-pod affinity descriptors all travel as string annotations on the
//! pod. This module owns the key constants and the parsing helpers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MachineError, MachineResult};

pub const ANNOTATION_QOS_CLASS: &str = "numagate.io/qos-class";
pub const ANNOTATION_NUMA_BINDING: &str = "numagate.io/numa-binding";
pub const ANNOTATION_NUMA_EXCLUSIVE: &str = "numagate.io/numa-exclusive";
pub const ANNOTATION_AFFINITY: &str = "numagate.io/inter-pod-affinity";
pub const ANNOTATION_ANTI_AFFINITY: &str = "numagate.io/inter-pod-anti-affinity";

/// Value enabling a boolean annotation.
pub const ANNOTATION_ENABLED: &str = "enabled";

/// QoS class of a request, dispatching it to a hint strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosClass {
    Shared,
    Reclaimed,
    Dedicated,
}

impl QosClass {
    /// Parse the QoS class annotation. A missing annotation means
    /// `Shared`; an unrecognized value is a malformed-input error.
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> MachineResult<QosClass> {
        match annotations.get(ANNOTATION_QOS_CLASS).map(String::as_str) {
            None | Some("shared") => Ok(QosClass::Shared),
            Some("reclaimed") => Ok(QosClass::Reclaimed),
            Some("dedicated") => Ok(QosClass::Dedicated),
            Some(other) => Err(MachineError::UnknownQosClass(other.to_string())),
        }
    }
}

/// Whether the request demands NUMA binding.
pub fn numa_binding(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(ANNOTATION_NUMA_BINDING)
        .is_some_and(|v| v == ANNOTATION_ENABLED)
}

/// Whether the request demands exclusive use of its NUMA nodes.
pub fn numa_exclusive(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(ANNOTATION_NUMA_EXCLUSIVE)
        .is_some_and(|v| v == ANNOTATION_ENABLED)
}
