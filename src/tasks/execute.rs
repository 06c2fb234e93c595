// src/tasks/execute.rs

use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use tracing::{debug, info, warn};

use crate::action::ActionRef;
use crate::dag::task::{
    DependencyResults, StatusOutcome, Task, TaskDependency, TaskFuture, TaskKey,
};
use crate::exec::{CommandSpec, run_checked, run_command};
use crate::state::VersionRecord;
use crate::tasks::{
    ActionOutput, ExecutedAction, ResolveActionTask, ResolvedAction, TaskFactory,
};

/// Checks and runs one build, deploy, test or run action.
#[derive(Debug)]
pub struct ExecuteTask {
    action: ActionRef,
    factory: TaskFactory,
}

impl ExecuteTask {
    pub fn new(action: ActionRef, factory: TaskFactory) -> Self {
        Self { action, factory }
    }

    pub fn key_for(action: &ActionRef) -> TaskKey {
        TaskKey::new(action.to_string())
    }

    fn resolved<'d>(
        &self,
        dependencies: &'d DependencyResults<ActionOutput>,
    ) -> anyhow::Result<&'d ResolvedAction> {
        dependencies
            .output(ResolveActionTask::key_for(&self.action).as_str())
            .and_then(ActionOutput::as_action)
            .ok_or_else(|| anyhow!("{} was not resolved before execution", self.action))
    }

    fn command(&self, resolved: &ResolvedAction, cmd: &str) -> CommandSpec {
        let mut env = resolved.env.clone();
        env.insert("ACTION_NAME".into(), self.action.name.clone());
        env.insert("ACTION_KIND".into(), self.action.kind.to_string());
        env.insert("ACTION_VERSION".into(), resolved.version.clone());

        CommandSpec {
            label: self.action.to_string(),
            cmd: cmd.to_string(),
            env,
            cwd: Some(self.factory.context().root.clone()),
            timeout: resolved.timeout,
        }
    }

    fn cached(&self, version: &str, outputs: BTreeMap<String, String>) -> ActionOutput {
        ActionOutput::Executed(ExecutedAction {
            action: self.action.clone(),
            version: version.to_string(),
            outputs,
            cached: true,
        })
    }
}

impl Task for ExecuteTask {
    type Output = ActionOutput;

    fn key(&self) -> TaskKey {
        Self::key_for(&self.action)
    }

    fn kind(&self) -> &'static str {
        self.action.kind.as_str()
    }

    fn description(&self) -> String {
        format!("{} {}", self.action.kind, self.action.name)
    }

    fn force(&self) -> bool {
        self.factory.context().is_forced(&self.action)
    }

    fn status_dependencies(&self) -> Vec<TaskDependency<ActionOutput>> {
        vec![TaskDependency::process(
            self.factory.resolve_action(&self.action),
        )]
    }

    /// The resolved action, plus every explicit dependency executed first.
    fn process_dependencies(&self) -> Vec<TaskDependency<ActionOutput>> {
        let mut deps = vec![TaskDependency::process(
            self.factory.resolve_action(&self.action),
        )];

        if let Some(node) = self.factory.context().graph.get(&self.action) {
            for (dep, edge) in node.dependencies.iter().filter(|(_, e)| e.explicit) {
                deps.push(TaskDependency::process(self.factory.execute(dep)).explicit(edge.explicit));
            }
        }

        deps
    }

    fn get_status<'a>(
        &'a self,
        dependencies: &'a DependencyResults<ActionOutput>,
    ) -> TaskFuture<'a, StatusOutcome<ActionOutput>> {
        Box::pin(async move {
            let resolved = self.resolved(dependencies)?;
            let store = &self.factory.context().store;
            let key = self.action.to_string();

            if let Some(status_cmd) = &resolved.status_cmd {
                let output = run_command(&self.command(resolved, status_cmd)).await?;
                debug!(action = %self.action, exit_code = output.exit_code, "status command finished");

                if !output.success {
                    return Ok(StatusOutcome::not_ready());
                }

                // The status command decides; stored outputs are a bonus.
                let outputs = match store.load(&key) {
                    Ok(stored) => stored.map(|r| r.outputs).unwrap_or_default(),
                    Err(e) => {
                        warn!(action = %self.action, error = %format!("{e:#}"), "ignoring unreadable stored version");
                        BTreeMap::new()
                    }
                };
                return Ok(StatusOutcome::ready(self.cached(&resolved.version, outputs)));
            }

            let stored = store
                .load(&key)
                .with_context(|| format!("loading stored version of {}", self.action))?;

            match stored {
                Some(record) if record.version == resolved.version => {
                    debug!(action = %self.action, version = %record.version, "version unchanged");
                    Ok(StatusOutcome::ready(
                        self.cached(&resolved.version, record.outputs),
                    ))
                }
                Some(record) => {
                    debug!(
                        action = %self.action,
                        stored = %record.version,
                        current = %resolved.version,
                        "version changed"
                    );
                    Ok(StatusOutcome::not_ready())
                }
                None => Ok(StatusOutcome::not_ready()),
            }
        })
    }

    fn process<'a>(
        &'a self,
        dependencies: &'a DependencyResults<ActionOutput>,
    ) -> TaskFuture<'a, ActionOutput> {
        Box::pin(async move {
            let resolved = self.resolved(dependencies)?;
            let output = run_checked(&self.command(resolved, &resolved.cmd)).await?;

            let outputs = BTreeMap::from([("log".to_string(), output.stdout.trim().to_string())]);
            let record = VersionRecord {
                version: resolved.version.clone(),
                outputs: outputs.clone(),
            };
            self.factory
                .context()
                .store
                .save(&self.action.to_string(), &record)
                .with_context(|| format!("storing version of {}", self.action))?;

            info!(action = %self.action, version = %resolved.version, "action executed");

            Ok(ActionOutput::Executed(ExecutedAction {
                action: self.action.clone(),
                version: resolved.version.clone(),
                outputs,
                cached: false,
            }))
        })
    }

    fn process_concurrency_limit(&self) -> Option<usize> {
        self.factory
            .context()
            .limits
            .get(&self.action.kind)
            .copied()
    }
}
