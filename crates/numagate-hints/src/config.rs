//! Hint engine configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use numagate_machine::CpuSet;

use crate::error::HintResult;

/// Static configuration of a `HintEngine`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HintEngineConfig {
    /// Machine-wide reserved CPUs, excluded from every node's capacity.
    pub reserved_cpus: CpuSet,
    /// Optional JSON file with precomputed hints per pod.
    pub extra_state_file: Option<PathBuf>,
}

impl HintEngineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> HintResult<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_is_empty() {
        let config = HintEngineConfig::default();
        assert!(config.reserved_cpus.is_empty());
        assert!(config.extra_state_file.is_none());
    }

    #[test]
    fn loads_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"reserved_cpus = \"0-1\"\nextra_state_file = \"/var/lib/numagate/extra_state.json\"\n",
        )
        .unwrap();

        let config = HintEngineConfig::load(file.path()).unwrap();
        assert_eq!(config.reserved_cpus.size(), 2);
        assert_eq!(
            config.extra_state_file,
            Some(PathBuf::from("/var/lib/numagate/extra_state.json"))
        );
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"reserved_cpus = \"3\"\n").unwrap();

        let config = HintEngineConfig::load(file.path()).unwrap();
        assert!(config.reserved_cpus.contains(3));
        assert!(config.extra_state_file.is_none());
    }
}
