//! numagate-reserve — scheduling-time affinity reservation cache.
//!
//! When the scheduler commits a node for a dedicated NUMA-binding pod it
//! records the decision here, so concurrent scheduling cycles see the
//! pod's labels and affinity constraints before the node's own
//! allocation state catches up. The cache lives outside the hint
//! engine's per-computation lifetime and is shared across threads.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use numagate_machine::{MachineResult, PodAffinity, QosClass, annotations};

/// Identity and metadata of a pod being scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodDescriptor {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl PodDescriptor {
    pub fn key(&self) -> String {
        format!("{}/{}:{}", self.namespace, self.name, self.uid)
    }
}

/// A committed affinity decision for one pod on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservedPod {
    pub pod_key: String,
    pub labels: BTreeMap<String, String>,
    pub affinity: PodAffinity,
}

/// Cross-node bookkeeping of committed affinity decisions.
///
/// Cloning is cheap and shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct ReservationCache {
    inner: Arc<RwLock<HashMap<String, BTreeMap<String, ReservedPod>>>>,
}

impl ReservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pod participates in NUMA-level affinity bookkeeping.
    fn qualifies(pod: &PodDescriptor) -> bool {
        matches!(
            QosClass::from_annotations(&pod.annotations),
            Ok(QosClass::Dedicated)
        ) && annotations::numa_binding(&pod.annotations)
    }

    /// Record that `node_name` was chosen for `pod`.
    ///
    /// Pods that are not dedicated + NUMA-binding are a no-op. The pod's
    /// affinity descriptor is parsed eagerly so a malformed annotation
    /// fails the reservation instead of a later filter pass.
    pub fn reserve(&self, node_name: &str, pod: &PodDescriptor) -> MachineResult<()> {
        if !Self::qualifies(pod) {
            return Ok(());
        }

        let affinity = PodAffinity::from_annotations(&pod.annotations)?;
        let reserved = ReservedPod {
            pod_key: pod.key(),
            labels: pod.labels.clone(),
            affinity,
        };

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .entry(node_name.to_string())
            .or_default()
            .insert(pod.key(), reserved);
        debug!(node = node_name, pod = %pod.key(), "reserved pod affinity");
        Ok(())
    }

    /// Release the record for `pod` on `node_name`. Absent records and
    /// non-qualifying pods are a no-op.
    pub fn unreserve(&self, node_name: &str, pod: &PodDescriptor) {
        if !Self::qualifies(pod) {
            return;
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(pods) = inner.get_mut(node_name) {
            pods.remove(&pod.key());
            if pods.is_empty() {
                inner.remove(node_name);
            }
            debug!(node = node_name, pod = %pod.key(), "unreserved pod affinity");
        }
    }

    /// Snapshot of the pods reserved on one node.
    pub fn reserved_on(&self, node_name: &str) -> Vec<ReservedPod> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .get(node_name)
            .map(|pods| pods.values().cloned().collect())
            .unwrap_or_default()
    }
}
