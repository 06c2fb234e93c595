// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ProjectConfig, RawProjectConfig};
use crate::errors::Result;

/// Default project file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Actiongraph.toml";

/// Read and deserialize a project file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProjectConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawProjectConfig> {
    let config: RawProjectConfig = toml::from_str(contents)?;
    Ok(config)
}

/// Load a project file and validate it.
///
/// This is the entry point for the rest of the crate.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ProjectConfig> {
    let raw = load_from_path(&path)?;
    let config = ProjectConfig::try_from(raw)?;
    debug!(
        path = %path.as_ref().display(),
        actions = config.action_count(),
        "loaded project config"
    );
    Ok(config)
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Directory that relative paths in the project (version store, commands)
/// are resolved against: the config file's parent, or the working directory.
pub fn project_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
