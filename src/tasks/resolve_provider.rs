// src/tasks/resolve_provider.rs

use anyhow::anyhow;
use tracing::debug;

use crate::dag::task::{
    DependencyResults, StatusOutcome, Task, TaskDependency, TaskFuture, TaskKey,
};
use crate::exec::{CommandSpec, run_checked};
use crate::tasks::{ActionOutput, ResolvedProvider, TaskFactory};

/// Prepares one provider. Always re-resolved: status is unknown.
#[derive(Debug)]
pub struct ResolveProviderTask {
    name: String,
    factory: TaskFactory,
}

impl ResolveProviderTask {
    pub fn new(name: impl Into<String>, factory: TaskFactory) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }

    pub fn key_for(name: &str) -> TaskKey {
        TaskKey::new(format!("resolve-provider.{name}"))
    }
}

impl Task for ResolveProviderTask {
    type Output = ActionOutput;

    fn key(&self) -> TaskKey {
        Self::key_for(&self.name)
    }

    fn kind(&self) -> &'static str {
        "resolve-provider"
    }

    fn description(&self) -> String {
        format!("resolving provider {}", self.name)
    }

    fn process_dependencies(&self) -> Vec<TaskDependency<ActionOutput>> {
        let graph = &self.factory.context().graph;
        graph
            .provider(&self.name)
            .map(|p| {
                p.dependencies
                    .iter()
                    .map(|dep| TaskDependency::process(self.factory.resolve_provider(dep)).explicit(true))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_status<'a>(
        &'a self,
        _dependencies: &'a DependencyResults<ActionOutput>,
    ) -> TaskFuture<'a, StatusOutcome<ActionOutput>> {
        Box::pin(async { Ok(StatusOutcome::unknown()) })
    }

    fn process<'a>(
        &'a self,
        _dependencies: &'a DependencyResults<ActionOutput>,
    ) -> TaskFuture<'a, ActionOutput> {
        Box::pin(async move {
            let ctx = self.factory.context();
            let provider = ctx
                .graph
                .provider(&self.name)
                .ok_or_else(|| anyhow!("unknown provider '{}'", self.name))?;

            let init_log = match &provider.init_cmd {
                Some(cmd) => {
                    let spec = CommandSpec {
                        label: format!("provider.{}", self.name),
                        cmd: cmd.clone(),
                        env: provider.env.clone(),
                        cwd: Some(ctx.root.clone()),
                        timeout: None,
                    };
                    let output = run_checked(&spec).await?;
                    Some(output.stdout.trim().to_string())
                }
                None => None,
            };

            debug!(provider = %self.name, "provider resolved");

            Ok(ActionOutput::Provider(ResolvedProvider {
                name: self.name.clone(),
                env: provider.env.clone(),
                init_log,
            }))
        })
    }
}
