// src/action/version.rs

//! Content versions for actions.
//!
//! An action's version is a blake3 hash over its own configuration and the
//! versions of everything it depends on, so changing a dependency changes
//! every dependant's version too.

use std::collections::{BTreeMap, HashSet};

use blake3::Hasher;
use tracing::debug;

use crate::action::dependency::DependencyEdge;
use crate::action::kind::ActionRef;
use crate::config::model::ActionConfig;

/// Length of the hex version string kept per action.
const VERSION_LEN: usize = 16;

fn update_field(hasher: &mut Hasher, name: &str, value: &str) {
    hasher.update(name.as_bytes());
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Hash of the action's own configuration, independent of dependencies.
pub fn config_hash(action: &ActionRef, config: &ActionConfig) -> String {
    let mut hasher = Hasher::new();
    update_field(&mut hasher, "action", &action.to_string());
    update_field(&mut hasher, "cmd", &config.cmd);
    update_field(&mut hasher, "status_cmd", config.status_cmd.as_deref().unwrap_or(""));
    update_field(&mut hasher, "provider", config.effective_provider());
    update_field(&mut hasher, "timeout", config.timeout.as_deref().unwrap_or(""));
    for (key, value) in config.env.iter() {
        update_field(&mut hasher, "env.key", key);
        update_field(&mut hasher, "env.value", value);
    }
    hasher.finalize().to_hex().to_string()
}

/// Compute versions for every action in `configs`.
///
/// Dependencies inside a cycle contribute their own reference instead of a
/// version; the solver rejects those actions anyway.
pub fn compute_versions(
    configs: &BTreeMap<ActionRef, ActionConfig>,
    edges: &BTreeMap<ActionRef, BTreeMap<ActionRef, DependencyEdge>>,
) -> BTreeMap<ActionRef, String> {
    let mut versions = BTreeMap::new();
    let mut visiting = HashSet::new();

    for action in configs.keys() {
        version_of(action, configs, edges, &mut versions, &mut visiting);
    }

    versions
}

fn version_of(
    action: &ActionRef,
    configs: &BTreeMap<ActionRef, ActionConfig>,
    edges: &BTreeMap<ActionRef, BTreeMap<ActionRef, DependencyEdge>>,
    versions: &mut BTreeMap<ActionRef, String>,
    visiting: &mut HashSet<ActionRef>,
) -> String {
    if let Some(version) = versions.get(action) {
        return version.clone();
    }

    if !visiting.insert(action.clone()) {
        debug!(action = %action, "dependency cycle while versioning");
        return action.to_string();
    }

    let mut hasher = Hasher::new();
    if let Some(config) = configs.get(action) {
        hasher.update(config_hash(action, config).as_bytes());
    }

    if let Some(deps) = edges.get(action) {
        for dep in deps.keys() {
            let dep_version = version_of(dep, configs, edges, versions, visiting);
            update_field(&mut hasher, &dep.to_string(), &dep_version);
        }
    }

    visiting.remove(action);

    let mut version = hasher.finalize().to_hex().to_string();
    version.truncate(VERSION_LEN);
    let version = format!("v-{version}");

    versions.insert(action.clone(), version.clone());
    version
}
