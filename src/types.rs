use std::str::FromStr;

use serde::Deserialize;

/// Where execute tasks record the version of their last successful run.
///
/// The record is what `get_status` consults to decide whether an action is
/// already up to date; it is never used for scheduler state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStorageMode {
    /// Store versions in a file (`.actiongraph/versions.toml`).
    #[default]
    File,
    /// Store versions in memory only (lost on exit).
    Memory,
}

impl FromStr for VersionStorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(VersionStorageMode::File),
            "memory" => Ok(VersionStorageMode::Memory),
            other => Err(format!(
                "invalid version_storage: {other} (expected \"file\" or \"memory\")"
            )),
        }
    }
}
