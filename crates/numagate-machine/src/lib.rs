//! numagate-machine — machine model for NUMA placement admission.
//!
//! Provides the immutable description of a machine (CPU sets, NUMA/socket
//! topology) and the per-computation allocation snapshot consumed by the
//! hint engine in `numagate-hints`. Nothing here mutates live state: a
//! `MachineState` is a read-only snapshot supplied by the caller, and
//! `CpuTopology` never changes after construction.

pub mod affinity;
pub mod annotations;
pub mod cpuset;
pub mod error;
pub mod state;
pub mod topology;

pub use affinity::{AffinityTerm, PodAffinity, Selector, SelectorZone};
pub use annotations::QosClass;
pub use cpuset::CpuSet;
pub use error::{MachineError, MachineResult};
pub use state::{AllocationEntry, ContainerType, MachineState, NumaNodeState, PodEntries};
pub use topology::CpuTopology;
