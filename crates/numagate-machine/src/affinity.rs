//! Inter-pod affinity descriptor.
//!
//! Affinity constraints are carried as JSON inside the two affinity
//! annotations. Each constraint is a required-match `Selector`: a set of
//! label key → value pairs plus a zone qualifier deciding whether the
//! match binds a single NUMA node or every node sharing the socket.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::annotations::{ANNOTATION_AFFINITY, ANNOTATION_ANTI_AFFINITY};
use crate::error::{MachineError, MachineResult};

/// Scope of a selector match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorZone {
    /// Match applies to the evaluated NUMA node only.
    #[default]
    Numa,
    /// Match applies to every NUMA node on the same socket.
    Socket,
}

/// A required-match clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub zone: SelectorZone,
}

/// The required selectors of one affinity direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityTerm {
    #[serde(default)]
    pub required: Vec<Selector>,
}

/// A pod's declared affinity and anti-affinity constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodAffinity {
    pub affinity: Option<AffinityTerm>,
    pub anti_affinity: Option<AffinityTerm>,
}

impl PodAffinity {
    /// Parse the affinity descriptor from pod annotations.
    ///
    /// Absent or empty annotation values yield `None` terms; malformed
    /// JSON is a fatal malformed-input error.
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> MachineResult<Self> {
        Ok(Self {
            affinity: parse_term(annotations.get(ANNOTATION_AFFINITY))?,
            anti_affinity: parse_term(annotations.get(ANNOTATION_ANTI_AFFINITY))?,
        })
    }
}

fn parse_term(raw: Option<&String>) -> MachineResult<Option<AffinityTerm>> {
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => serde_json::from_str(s)
            .map(Some)
            .map_err(|e| MachineError::InvalidAffinityAnnotation(e.to_string())),
    }
}
