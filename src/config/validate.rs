// src/config/validate.rs

use crate::action::template;
use crate::action::{ActionRef, TemplateField};
use crate::config::model::{DEFAULT_PROVIDER, ProjectConfig, RawProjectConfig};
use crate::errors::{ActionGraphError, Result};
use crate::exec::parse_duration;

impl TryFrom<RawProjectConfig> for ProjectConfig {
    type Error = ActionGraphError;

    fn try_from(raw: RawProjectConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ProjectConfig::new_unchecked(raw))
    }
}

/// Semantic checks on a raw project file.
///
/// Dependency cycles are allowed here; the solver reports them per action.
pub fn validate_raw_config(cfg: &RawProjectConfig) -> Result<()> {
    ensure_has_actions(cfg)?;
    validate_project_section(cfg)?;
    validate_providers(cfg)?;
    validate_actions(cfg)?;
    Ok(())
}

fn ensure_has_actions(cfg: &RawProjectConfig) -> Result<()> {
    if cfg.actions().next().is_none() {
        return Err(ActionGraphError::ConfigError(
            "config must contain at least one [build|deploy|test|run.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_project_section(cfg: &RawProjectConfig) -> Result<()> {
    if cfg.project.concurrency == 0 {
        return Err(ActionGraphError::ConfigError(
            "[project].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    for (kind, limit) in cfg.project.limits.iter() {
        if *limit == 0 {
            return Err(ActionGraphError::ConfigError(format!(
                "[project.limits].{kind} must be >= 1 (got 0)"
            )));
        }
    }

    Ok(())
}

fn validate_providers(cfg: &RawProjectConfig) -> Result<()> {
    let exists = |name: &str| name == DEFAULT_PROVIDER || cfg.provider.contains_key(name);

    for (name, provider) in cfg.provider.iter() {
        for dep in provider.dependencies.iter() {
            if dep == name {
                return Err(ActionGraphError::ConfigError(format!(
                    "provider '{name}' cannot depend on itself"
                )));
            }
            if !exists(dep) {
                return Err(ActionGraphError::ConfigError(format!(
                    "provider '{name}' has unknown dependency '{dep}'"
                )));
            }
        }
    }

    Ok(())
}

fn validate_actions(cfg: &RawProjectConfig) -> Result<()> {
    for (action, config) in cfg.actions() {
        if config.cmd.trim().is_empty() {
            return Err(ActionGraphError::ConfigError(format!(
                "action '{action}' has an empty `cmd`"
            )));
        }

        for dep in config.dependencies.iter() {
            let dep: ActionRef = dep.parse().map_err(|e| {
                ActionGraphError::ConfigError(format!("action '{action}': {e}"))
            })?;
            if dep == action {
                return Err(ActionGraphError::ConfigError(format!(
                    "action '{action}' cannot depend on itself in `dependencies`"
                )));
            }
            if !cfg.contains(&dep) {
                return Err(ActionGraphError::ConfigError(format!(
                    "action '{action}' has unknown dependency '{dep}' in `dependencies`"
                )));
            }
        }

        let provider = config.effective_provider();
        if provider != DEFAULT_PROVIDER && !cfg.provider.contains_key(provider) {
            return Err(ActionGraphError::ConfigError(format!(
                "action '{action}' uses unknown provider '{provider}'"
            )));
        }

        if let Some(timeout) = &config.timeout {
            parse_duration(timeout).map_err(|e| {
                ActionGraphError::ConfigError(format!("action '{action}' has invalid timeout: {e}"))
            })?;
        }

        for source in config.template_sources() {
            for reference in template::scan(source)? {
                if !cfg.contains(&reference.action) {
                    return Err(ActionGraphError::TemplateError(format!(
                        "action '{action}' references unknown action in {reference}"
                    )));
                }
                if reference.action == action
                    && matches!(reference.field, TemplateField::Output(_))
                {
                    return Err(ActionGraphError::TemplateError(format!(
                        "action '{action}' cannot read its own outputs in {reference}"
                    )));
                }
            }
        }
    }

    Ok(())
}
