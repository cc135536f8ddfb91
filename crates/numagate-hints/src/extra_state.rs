//! Precomputed-hint override file.
//!
//! Operators can pin a pod's hints ahead of time in a JSON file keyed by
//! pod name and resource. When present, these hints are used verbatim —
//! restricted to the NUMA-bindable part of the machine — instead of a
//! fresh calculation.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::HintResult;
use crate::request::TopologyHint;

/// pod name → resource name → hint list.
type ExtraStateFile = BTreeMap<String, BTreeMap<String, Vec<ExtraHint>>>;

#[derive(Debug, Clone, Deserialize)]
struct ExtraHint {
    nodes: Vec<u32>,
    #[serde(default)]
    preferred: bool,
}

/// Look up precomputed hints for a pod and resource.
///
/// `Ok(None)` when the file, pod, or resource key is absent, or when
/// every listed hint falls outside `allowed_numas`. IO and parse
/// failures are surfaced; the engine treats them as a miss.
pub fn hints_from_extra_state_file(
    path: &Path,
    pod_name: &str,
    resource: &str,
    allowed_numas: &BTreeSet<u32>,
) -> HintResult<Option<Vec<TopologyHint>>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)?;
    let file: ExtraStateFile = serde_json::from_str(&raw)?;

    let Some(entries) = file.get(pod_name).and_then(|m| m.get(resource)) else {
        return Ok(None);
    };

    let mut hints = Vec::new();
    for entry in entries {
        if entry.nodes.is_empty() || !entry.nodes.iter().all(|n| allowed_numas.contains(n)) {
            warn!(
                pod = pod_name,
                nodes = ?entry.nodes,
                "extra state hint references non-bindable NUMA nodes, dropping"
            );
            continue;
        }
        let mut nodes = entry.nodes.clone();
        nodes.sort_unstable();
        nodes.dedup();
        hints.push(TopologyHint {
            nodes,
            preferred: entry.preferred,
        });
    }

    if hints.is_empty() {
        Ok(None)
    } else {
        Ok(Some(hints))
    }
}
