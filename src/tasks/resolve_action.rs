// src/tasks/resolve_action.rs

use std::collections::BTreeMap;

use anyhow::anyhow;
use tracing::debug;

use crate::action::template::{self, TemplateField, TemplateRef};
use crate::action::{ActionNode, ActionRef, DependencyCost, classify};
use crate::dag::task::{
    DependencyResults, StatusOutcome, Task, TaskDependency, TaskFuture, TaskKey,
};
use crate::errors::{ActionGraphError, Result};
use crate::exec::parse_duration;
use crate::tasks::{
    ActionOutput, ExecuteTask, ResolveProviderTask, ResolvedAction, TaskFactory,
};

/// Renders an action's templates. Always re-resolved: status is unknown.
#[derive(Debug)]
pub struct ResolveActionTask {
    action: ActionRef,
    factory: TaskFactory,
}

impl ResolveActionTask {
    pub fn new(action: ActionRef, factory: TaskFactory) -> Self {
        Self { action, factory }
    }

    pub fn key_for(action: &ActionRef) -> TaskKey {
        TaskKey::new(format!("resolve-action.{action}"))
    }

    fn node(&self) -> anyhow::Result<&ActionNode> {
        Ok(self.factory.context().graph.require(&self.action)?)
    }

    /// Value of one template reference, read from settled dependencies.
    fn lookup(
        &self,
        reference: &TemplateRef,
        dependencies: &DependencyResults<ActionOutput>,
    ) -> Result<String> {
        let target = &reference.action;

        match &reference.field {
            TemplateField::Name => Ok(target.name.clone()),
            TemplateField::Kind => Ok(target.kind.to_string()),
            TemplateField::Version => {
                if target == &self.action {
                    return Ok(self
                        .factory
                        .context()
                        .graph
                        .require(target)?
                        .version
                        .clone());
                }
                dependencies
                    .output(ResolveActionTask::key_for(target).as_str())
                    .and_then(ActionOutput::as_action)
                    .map(|resolved| resolved.version.clone())
                    .ok_or_else(|| {
                        ActionGraphError::TemplateError(format!(
                            "{reference}: {target} has not been resolved"
                        ))
                    })
            }
            TemplateField::Output(key) => dependencies
                .output(ExecuteTask::key_for(target).as_str())
                .and_then(ActionOutput::as_executed)
                .ok_or_else(|| {
                    ActionGraphError::TemplateError(format!(
                        "{reference}: {target} has not been executed"
                    ))
                })?
                .outputs
                .get(key)
                .cloned()
                .ok_or_else(|| {
                    ActionGraphError::TemplateError(format!(
                        "{reference}: {target} has no output '{key}'"
                    ))
                }),
        }
    }
}

impl Task for ResolveActionTask {
    type Output = ActionOutput;

    fn key(&self) -> TaskKey {
        Self::key_for(&self.action)
    }

    fn kind(&self) -> &'static str {
        "resolve-action"
    }

    fn description(&self) -> String {
        format!("resolving {}", self.action)
    }

    /// The provider, plus each dependency at the cost its edge needs.
    fn process_dependencies(&self) -> Vec<TaskDependency<ActionOutput>> {
        let Ok(node) = self.node() else {
            return Vec::new();
        };

        let mut deps = vec![TaskDependency::process(
            self.factory
                .resolve_provider(node.config.effective_provider()),
        )];

        for (dep, edge) in node.dependencies.iter() {
            let task = match classify(edge) {
                DependencyCost::Executed => self.factory.execute(dep),
                DependencyCost::Resolved => self.factory.resolve_action(dep),
                DependencyCost::None => continue,
            };
            deps.push(TaskDependency::process(task).explicit(edge.explicit));
        }

        deps
    }

    fn get_status<'a>(
        &'a self,
        _dependencies: &'a DependencyResults<ActionOutput>,
    ) -> TaskFuture<'a, StatusOutcome<ActionOutput>> {
        Box::pin(async { Ok(StatusOutcome::unknown()) })
    }

    fn process<'a>(
        &'a self,
        dependencies: &'a DependencyResults<ActionOutput>,
    ) -> TaskFuture<'a, ActionOutput> {
        Box::pin(async move {
            let node = self.node()?;
            let config = &node.config;
            let provider = config.effective_provider();

            let provider_env = dependencies
                .output(ResolveProviderTask::key_for(provider).as_str())
                .and_then(ActionOutput::as_provider)
                .map(|p| p.env.clone())
                .unwrap_or_default();

            let render = |text: &str| template::render(text, |r| self.lookup(r, dependencies));

            let cmd = render(&config.cmd)?;
            let status_cmd = config.status_cmd.as_deref().map(render).transpose()?;

            let mut env: BTreeMap<String, String> = provider_env;
            for (key, value) in config.env.iter() {
                env.insert(key.clone(), render(value)?);
            }

            let timeout = config
                .timeout
                .as_deref()
                .map(parse_duration)
                .transpose()
                .map_err(|e| anyhow!("invalid timeout for {}: {e}", self.action))?;

            debug!(action = %self.action, version = %node.version, "action resolved");

            Ok(ActionOutput::Action(ResolvedAction {
                action: self.action.clone(),
                version: node.version.clone(),
                provider: provider.to_string(),
                cmd,
                status_cmd,
                env,
                timeout,
            }))
        })
    }
}
