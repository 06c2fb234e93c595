// src/action/graph.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::action::dependency::{DependencyEdge, collect_edges};
use crate::action::kind::{ActionKind, ActionRef};
use crate::action::template::{self, TemplateRef};
use crate::action::version::compute_versions;
use crate::config::model::{ActionConfig, ProjectConfig, ProviderConfig};
use crate::errors::{ActionGraphError, Result};

/// One action with everything discovered about it up front.
#[derive(Debug, Clone)]
pub struct ActionNode {
    pub action: ActionRef,
    pub config: ActionConfig,
    /// Template references found in `cmd`, `status_cmd` and `env`.
    pub templates: Vec<TemplateRef>,
    pub dependencies: BTreeMap<ActionRef, DependencyEdge>,
    pub version: String,
}

/// Static view of a project's actions, their dependency edges and versions.
///
/// Templates are scanned once per action here, so the solver's lazy
/// expansion never re-parses configuration.
#[derive(Debug, Clone)]
pub struct ActionGraph {
    actions: BTreeMap<ActionRef, ActionNode>,
    providers: BTreeMap<String, ProviderConfig>,
    config: ProjectConfig,
}

impl ActionGraph {
    pub fn from_config(config: &ProjectConfig) -> Result<Self> {
        let mut configs = BTreeMap::new();
        let mut scanned = BTreeMap::new();
        let mut edges = BTreeMap::new();

        for (action, action_config) in config.actions() {
            let mut templates = Vec::new();
            for source in action_config.template_sources() {
                templates.extend(template::scan(source)?);
            }

            let explicit = action_config
                .dependencies
                .iter()
                .map(|d| d.parse::<ActionRef>())
                .collect::<Result<Vec<_>>>()?;

            let deps = collect_edges(&action, &explicit, &templates);
            debug!(
                action = %action,
                templates = templates.len(),
                dependencies = deps.len(),
                "scanned action"
            );

            edges.insert(action.clone(), deps);
            scanned.insert(action.clone(), templates);
            configs.insert(action, action_config.clone());
        }

        let mut versions = compute_versions(&configs, &edges);

        let mut actions = BTreeMap::new();
        for (action, action_config) in configs {
            let node = ActionNode {
                templates: scanned.remove(&action).unwrap_or_default(),
                dependencies: edges.remove(&action).unwrap_or_default(),
                version: versions.remove(&action).unwrap_or_default(),
                config: action_config,
                action: action.clone(),
            };
            actions.insert(action, node);
        }

        let mut providers = config.providers().clone();
        for node in actions.values() {
            let name = node.config.effective_provider();
            if !providers.contains_key(name) {
                if let Some(provider) = config.provider(name) {
                    providers.insert(name.to_string(), provider);
                }
            }
        }

        Ok(Self {
            actions,
            providers,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn get(&self, action: &ActionRef) -> Option<&ActionNode> {
        self.actions.get(action)
    }

    pub fn require(&self, action: &ActionRef) -> Result<&ActionNode> {
        self.actions
            .get(action)
            .ok_or_else(|| ActionGraphError::ActionNotFound(action.to_string()))
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionNode> {
        self.actions.values()
    }

    pub fn actions_of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &ActionNode> {
        self.actions.values().filter(move |n| n.action.kind == kind)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn providers(&self) -> impl Iterator<Item = (&String, &ProviderConfig)> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Resolve CLI-style names of one kind to refs. No names means every
    /// action of that kind.
    pub fn select(&self, kind: ActionKind, names: &[String]) -> Result<Vec<ActionRef>> {
        if names.is_empty() {
            return Ok(self
                .actions_of_kind(kind)
                .map(|n| n.action.clone())
                .collect());
        }

        names
            .iter()
            .map(|name| {
                let action = ActionRef::new(kind, name.clone());
                self.require(&action).map(|_| action)
            })
            .collect()
    }
}
