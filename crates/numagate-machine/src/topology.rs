//! Immutable machine topology: sockets, NUMA nodes, and their CPUs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cpuset::CpuSet;
use crate::error::{MachineError, MachineResult};

/// Description of a machine's NUMA layout.
///
/// Built once from discovery data and never mutated. All hint computations
/// borrow it read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpuTopology {
    socket_to_numas: BTreeMap<u32, Vec<u32>>,
    numa_to_cpus: BTreeMap<u32, CpuSet>,
    numa_to_socket: BTreeMap<u32, u32>,
}

impl CpuTopology {
    /// Build a topology from the socket → NUMA and NUMA → CPU mappings.
    ///
    /// Every NUMA node must belong to exactly one socket and carry at
    /// least one CPU.
    pub fn new(
        socket_to_numas: BTreeMap<u32, Vec<u32>>,
        numa_to_cpus: BTreeMap<u32, CpuSet>,
    ) -> MachineResult<Self> {
        if socket_to_numas.is_empty() || numa_to_cpus.is_empty() {
            return Err(MachineError::EmptyTopology);
        }

        let mut numa_to_socket = BTreeMap::new();
        for (&socket, numas) in &socket_to_numas {
            for &numa in numas {
                numa_to_socket.insert(numa, socket);
            }
        }
        for (&numa, cpus) in &numa_to_cpus {
            if !numa_to_socket.contains_key(&numa) {
                return Err(MachineError::NumaWithoutSocket(numa));
            }
            if cpus.is_empty() {
                return Err(MachineError::EmptyNumaNode(numa));
            }
        }
        for &numa in numa_to_socket.keys() {
            if !numa_to_cpus.contains_key(&numa) {
                return Err(MachineError::UnknownNumaNode(numa));
            }
        }

        Ok(Self {
            socket_to_numas,
            numa_to_cpus,
            numa_to_socket,
        })
    }

    pub fn num_numa_nodes(&self) -> usize {
        self.numa_to_cpus.len()
    }

    pub fn num_sockets(&self) -> usize {
        self.socket_to_numas.len()
    }

    /// All NUMA node IDs in ascending order.
    pub fn numa_ids(&self) -> Vec<u32> {
        self.numa_to_cpus.keys().copied().collect()
    }

    pub fn cpus_in_numa(&self, numa: u32) -> MachineResult<&CpuSet> {
        self.numa_to_cpus
            .get(&numa)
            .ok_or(MachineError::UnknownNumaNode(numa))
    }

    pub fn socket_of_numa(&self, numa: u32) -> MachineResult<u32> {
        self.numa_to_socket
            .get(&numa)
            .copied()
            .ok_or(MachineError::UnknownNumaNode(numa))
    }

    pub fn numas_in_socket(&self, socket: u32) -> MachineResult<&[u32]> {
        self.socket_to_numas
            .get(&socket)
            .map(Vec::as_slice)
            .ok_or(MachineError::UnknownSocket(socket))
    }

    /// NUMA node count per socket.
    ///
    /// Errors when sockets hold uneven node counts; the locality rule in
    /// the hint calculator is only meaningful on a uniform layout.
    pub fn numas_per_socket(&self) -> MachineResult<u32> {
        let mut counts = self.socket_to_numas.values().map(Vec::len);
        let first = counts.next().ok_or(MachineError::EmptyTopology)?;
        if counts.any(|c| c != first) {
            return Err(MachineError::UnevenSockets);
        }
        Ok(first as u32)
    }

    /// Whether the given NUMA nodes span more than one socket.
    pub fn crosses_sockets(&self, numas: &[u32]) -> MachineResult<bool> {
        let mut seen: Option<u32> = None;
        for &numa in numas {
            let socket = self.socket_of_numa(numa)?;
            match seen {
                None => seen = Some(socket),
                Some(s) if s != socket => return Ok(true),
                Some(_) => {}
            }
        }
        Ok(false)
    }

    /// Minimum number of NUMA nodes whose combined CPU capacity can
    /// satisfy `cpu_request`, taking the largest nodes first.
    ///
    /// Errors when even the whole machine cannot satisfy the request.
    pub fn min_numa_nodes_to_fit(&self, cpu_request: u32) -> MachineResult<u32> {
        let mut counts: Vec<usize> = self.numa_to_cpus.values().map(CpuSet::size).collect();
        counts.sort_unstable_by(|a, b| b.cmp(a));

        let mut total = 0usize;
        for (i, count) in counts.iter().enumerate() {
            total += count;
            if total >= cpu_request as usize {
                return Ok((i + 1) as u32);
            }
        }
        Err(MachineError::CpuRequestTooLarge {
            requested: cpu_request,
            capacity: total as u32,
        })
    }
}
