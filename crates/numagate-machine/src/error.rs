//! Error types for the machine model.

use thiserror::Error;

/// Result type alias for machine model operations.
pub type MachineResult<T> = Result<T, MachineError>;

/// Errors that can occur while building or querying the machine model.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("topology has no sockets or NUMA nodes")]
    EmptyTopology,

    #[error("unknown NUMA node: {0}")]
    UnknownNumaNode(u32),

    #[error("unknown socket: {0}")]
    UnknownSocket(u32),

    #[error("NUMA node {0} is not mapped to any socket")]
    NumaWithoutSocket(u32),

    #[error("NUMA node {0} has no CPUs")]
    EmptyNumaNode(u32),

    #[error("sockets hold uneven NUMA node counts")]
    UnevenSockets,

    #[error("cpu request {requested} exceeds machine capacity {capacity}")]
    CpuRequestTooLarge { requested: u32, capacity: u32 },

    #[error("allocation on NUMA node {numa} references CPUs outside the node")]
    AllocationOutsideNode { numa: u32 },

    #[error("invalid cpu list: {0}")]
    InvalidCpuList(String),

    #[error("invalid affinity annotation: {0}")]
    InvalidAffinityAnnotation(String),

    #[error("unknown qos class: {0}")]
    UnknownQosClass(String),
}
