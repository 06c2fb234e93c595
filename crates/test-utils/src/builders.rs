#![allow(dead_code)]

use std::collections::BTreeMap;

use actiongraph::action::{ActionKind, ActionRef};
use actiongraph::config::{ActionConfig, ProjectConfig, ProviderConfig, RawProjectConfig};
use actiongraph::types::VersionStorageMode;

/// Builder for `ProjectConfig` to simplify test setup.
pub struct ProjectConfigBuilder {
    config: RawProjectConfig,
}

impl ProjectConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawProjectConfig::default();
        config.project.version_storage = VersionStorageMode::Memory;
        Self { config }
    }

    /// Add an action, e.g. `with_action("build.api", ...)`.
    pub fn with_action(mut self, action: &str, cfg: ActionConfig) -> Self {
        let action: ActionRef = action.parse().expect("valid action ref in test");
        let section = match action.kind {
            ActionKind::Build => &mut self.config.build,
            ActionKind::Deploy => &mut self.config.deploy,
            ActionKind::Test => &mut self.config.test,
            ActionKind::Run => &mut self.config.run,
        };
        section.insert(action.name, cfg);
        self
    }

    pub fn with_provider(mut self, name: &str, provider: ProviderConfig) -> Self {
        self.config.provider.insert(name.to_string(), provider);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.project.concurrency = n;
        self
    }

    pub fn limit(mut self, kind: ActionKind, n: usize) -> Self {
        self.config.project.limits.insert(kind, n);
        self
    }

    pub fn raw(self) -> RawProjectConfig {
        self.config
    }

    pub fn build(self) -> ProjectConfig {
        ProjectConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ProjectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ActionConfig`.
pub struct ActionConfigBuilder {
    action: ActionConfig,
}

impl ActionConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            action: ActionConfig {
                cmd: cmd.to_string(),
                status_cmd: None,
                dependencies: vec![],
                env: BTreeMap::new(),
                timeout: None,
                provider: None,
            },
        }
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.action.dependencies.push(dep.to_string());
        self
    }

    pub fn status_cmd(mut self, cmd: &str) -> Self {
        self.action.status_cmd = Some(cmd.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.action.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.action.timeout = Some(timeout.to_string());
        self
    }

    pub fn provider(mut self, name: &str) -> Self {
        self.action.provider = Some(name.to_string());
        self
    }

    pub fn build(self) -> ActionConfig {
        self.action
    }
}

/// Builder for `ProviderConfig`.
pub struct ProviderConfigBuilder {
    provider: ProviderConfig,
}

impl ProviderConfigBuilder {
    pub fn new() -> Self {
        Self {
            provider: ProviderConfig::default(),
        }
    }

    pub fn init_cmd(mut self, cmd: &str) -> Self {
        self.provider.init_cmd = Some(cmd.to_string());
        self
    }

    pub fn depends_on(mut self, provider: &str) -> Self {
        self.provider.dependencies.push(provider.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.provider.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> ProviderConfig {
        self.provider
    }
}

impl Default for ProviderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
