// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::action::{ActionKind, ActionRef};
use crate::engine::DEFAULT_CONCURRENCY;
use crate::types::VersionStorageMode;

/// Provider used by actions that do not name one. Always available.
pub const DEFAULT_PROVIDER: &str = "exec";

/// Project file as read from TOML, before validation.
///
/// ```toml
/// [project]
/// name = "demo"
/// concurrency = 4
///
/// [provider.docker]
/// init_cmd = "docker info"
///
/// [build.api]
/// cmd = "docker build -t api ."
/// provider = "docker"
///
/// [deploy.web]
/// cmd = "kubectl apply -f web.yaml"
/// dependencies = ["build.api"]
/// env = { IMAGE = "api:${actions.build.api.version}" }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub provider: BTreeMap<String, ProviderConfig>,

    #[serde(default)]
    pub build: BTreeMap<String, ActionConfig>,
    #[serde(default)]
    pub deploy: BTreeMap<String, ActionConfig>,
    #[serde(default)]
    pub test: BTreeMap<String, ActionConfig>,
    #[serde(default)]
    pub run: BTreeMap<String, ActionConfig>,
}

impl RawProjectConfig {
    pub fn section(&self, kind: ActionKind) -> &BTreeMap<String, ActionConfig> {
        match kind {
            ActionKind::Build => &self.build,
            ActionKind::Deploy => &self.deploy,
            ActionKind::Test => &self.test,
            ActionKind::Run => &self.run,
        }
    }

    pub fn actions(&self) -> impl Iterator<Item = (ActionRef, &ActionConfig)> {
        ActionKind::ALL.into_iter().flat_map(move |kind| {
            self.section(kind)
                .iter()
                .map(move |(name, cfg)| (ActionRef::new(kind, name.clone()), cfg))
        })
    }

    pub fn contains(&self, action: &ActionRef) -> bool {
        self.section(action.kind).contains_key(&action.name)
    }
}

/// Validated project configuration.
///
/// Can only be obtained through `TryFrom<RawProjectConfig>`, so every
/// reference in it points at something that exists.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    raw: RawProjectConfig,
}

impl ProjectConfig {
    pub(crate) fn new_unchecked(raw: RawProjectConfig) -> Self {
        Self { raw }
    }

    pub fn project(&self) -> &ProjectSection {
        &self.raw.project
    }

    pub fn providers(&self) -> &BTreeMap<String, ProviderConfig> {
        &self.raw.provider
    }

    /// Provider config by name; the implicit `exec` provider gets an empty one.
    pub fn provider(&self, name: &str) -> Option<ProviderConfig> {
        match self.raw.provider.get(name) {
            Some(cfg) => Some(cfg.clone()),
            None if name == DEFAULT_PROVIDER => Some(ProviderConfig::default()),
            None => None,
        }
    }

    pub fn section(&self, kind: ActionKind) -> &BTreeMap<String, ActionConfig> {
        self.raw.section(kind)
    }

    pub fn actions(&self) -> impl Iterator<Item = (ActionRef, &ActionConfig)> {
        self.raw.actions()
    }

    pub fn action(&self, action: &ActionRef) -> Option<&ActionConfig> {
        self.raw.section(action.kind).get(&action.name)
    }

    pub fn action_count(&self) -> usize {
        ActionKind::ALL
            .iter()
            .map(|k| self.raw.section(*k).len())
            .sum()
    }
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    #[serde(default)]
    pub name: Option<String>,

    /// Global solver concurrency limit.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub version_storage: VersionStorageMode,

    /// Per-kind limit on concurrent execute calls, e.g. `{ deploy = 1 }`.
    #[serde(default)]
    pub limits: BTreeMap<ActionKind, usize>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: None,
            concurrency: default_concurrency(),
            version_storage: VersionStorageMode::default(),
            limits: BTreeMap::new(),
        }
    }
}

/// `[provider.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// Other providers that must be resolved first.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Run once when the provider resolves; a non-zero exit fails every
    /// action using the provider.
    #[serde(default)]
    pub init_cmd: Option<String>,

    /// Environment passed to every action using this provider.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[<kind>.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionConfig {
    /// The command to execute.
    pub cmd: String,

    /// Exit code 0 means the action is up to date.
    ///
    /// Without it, an action is up to date when its last successful run had
    /// the current version.
    #[serde(default)]
    pub status_cmd: Option<String>,

    /// Explicit ordering edges, written `<kind>.<name>`.
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Duration string, e.g. `"30s"` or `"5m"`.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub provider: Option<String>,
}

impl ActionConfig {
    pub fn effective_provider(&self) -> &str {
        self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Every string that may contain template references.
    pub fn template_sources(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.cmd.as_str())
            .chain(self.status_cmd.as_deref())
            .chain(self.env.values().map(String::as_str))
    }
}
