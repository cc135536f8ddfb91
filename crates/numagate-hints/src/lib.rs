//! numagate-hints — NUMA-aware CPU placement admission.
//!
//! Given a container's exclusive CPU request and a per-NUMA-node
//! allocation snapshot, this crate computes the admissible NUMA-node
//! combinations ("topology hints") and narrows them with inter-pod
//! affinity/anti-affinity constraints scoped to a NUMA node or a socket.
//!
//! # Components
//!
//! - **`calculator`** — candidate subset enumeration under capacity and
//!   locality constraints
//! - **`affinity`** — per-node affinity context and the parallel
//!   selector-match counters
//! - **`filter`** — rejection of candidates violating affinity constraints
//! - **`engine`** — QoS-class strategy dispatch and the full pipeline
//! - **`extra_state`** — precomputed-hint override file lookup
//!
//! The crate holds no state of its own: topology and machine state are
//! supplied by the caller as immutable snapshots for the duration of one
//! computation.

pub mod affinity;
pub mod calculator;
pub mod config;
pub mod engine;
pub mod error;
pub mod extra_state;
pub mod filter;
pub mod request;

pub use affinity::{NumaAffinityInfo, PodAffinityInfo, TopologyAffinityCount};
pub use calculator::{calculate_hints, regenerate_hints};
pub use config::HintEngineConfig;
pub use engine::{HintEngine, HintStrategy, MachineStateSource};
pub use error::{HintError, HintResult};
pub use filter::{PreFilterState, pod_affinity_filter, pre_pod_affinity_filter};
pub use request::{HintsResponse, RESOURCE_CPU, ResourceHints, ResourceRequest, TopologyHint};
