//! Error types for hint computation.

use numagate_machine::MachineError;
use thiserror::Error;

/// Result type alias for hint operations.
pub type HintResult<T> = Result<T, HintError>;

/// Errors that can occur while computing topology hints.
///
/// Any of these surfaced from a public entry point means admission
/// failure for the container; per-candidate infeasibility is never an
/// error, the candidate is just skipped.
#[derive(Debug, Error)]
pub enum HintError {
    #[error("invalid resource request: {0}")]
    InvalidRequest(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("required affinity cannot be satisfied while NUMA exclusivity is enabled")]
    ExclusiveWithAffinity,

    #[error("non-exclusive NUMA binding request needs {min_nodes} NUMA nodes, must fit in one")]
    BindingSpansNodes { min_nodes: u32 },

    #[error("NUMA node {0} missing from machine state snapshot")]
    MissingNumaState(u32),

    #[error("machine error: {0}")]
    Machine(#[from] MachineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}
