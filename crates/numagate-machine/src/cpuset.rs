//! CPU-ID set arithmetic.
//!
//! A `CpuSet` is an ordered set of CPU IDs with the union/difference/size
//! operations the hint calculator needs. The canonical text form is the
//! kernel cpulist format (`"0-3,8"`), which is also the serde
//! representation so sets stay compact inside JSON snapshots.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MachineError;

/// An ordered set of CPU IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CpuSet(BTreeSet<u32>);

impl CpuSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Number of CPUs in the set.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, cpu: u32) -> bool {
        self.0.contains(&cpu)
    }

    pub fn add(&mut self, cpu: u32) {
        self.0.insert(cpu);
    }

    /// Set union, returned as a new set.
    pub fn union(&self, other: &CpuSet) -> CpuSet {
        CpuSet(self.0.union(&other.0).copied().collect())
    }

    /// CPUs in `self` that are not in `other`.
    pub fn difference(&self, other: &CpuSet) -> CpuSet {
        CpuSet(self.0.difference(&other.0).copied().collect())
    }

    /// True when every CPU of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &CpuSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<u32> for CpuSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CpuSet {
    /// Canonical cpulist form: consecutive runs collapse to `start-end`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let mut iter = self.0.iter().copied();
        if let Some(first) = iter.next() {
            let mut start = first;
            let mut end = first;
            for cpu in iter {
                if cpu == end + 1 {
                    end = cpu;
                } else {
                    parts.push(range_part(start, end));
                    start = cpu;
                    end = cpu;
                }
            }
            parts.push(range_part(start, end));
        }
        write!(f, "{}", parts.join(","))
    }
}

fn range_part(start: u32, end: u32) -> String {
    if start == end {
        format!("{start}")
    } else {
        format!("{start}-{end}")
    }
}

impl FromStr for CpuSet {
    type Err = MachineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cpus = BTreeSet::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((lo, hi)) = part.split_once('-') {
                let lo: u32 = lo
                    .trim()
                    .parse()
                    .map_err(|_| MachineError::InvalidCpuList(s.to_string()))?;
                let hi: u32 = hi
                    .trim()
                    .parse()
                    .map_err(|_| MachineError::InvalidCpuList(s.to_string()))?;
                if lo > hi {
                    return Err(MachineError::InvalidCpuList(s.to_string()));
                }
                cpus.extend(lo..=hi);
            } else {
                let cpu: u32 = part
                    .parse()
                    .map_err(|_| MachineError::InvalidCpuList(s.to_string()))?;
                cpus.insert(cpu);
            }
        }
        Ok(Self(cpus))
    }
}

impl From<CpuSet> for String {
    fn from(set: CpuSet) -> String {
        set.to_string()
    }
}

impl TryFrom<String> for CpuSet {
    type Error = MachineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
