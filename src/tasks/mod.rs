// src/tasks/mod.rs

//! Concrete task kinds scheduled by the solver.
//!
//! - [`ResolveProviderTask`] prepares a provider (runs its `init_cmd`).
//! - [`ResolveActionTask`] renders an action's templates into a
//!   [`ResolvedAction`].
//! - [`ExecuteTask`] checks and runs one build/deploy/test/run action.
//!
//! Tasks never hold other tasks. They build their dependencies on demand
//! through a [`TaskFactory`]; the solver collapses equal keys into one node.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::action::{ActionGraph, ActionKind, ActionRef};
use crate::dag::task::BoxTask;
use crate::engine::TaskRequest;
use crate::errors::Result;
use crate::state::VersionStore;

pub mod execute;
pub mod resolve_action;
pub mod resolve_provider;

pub use execute::ExecuteTask;
pub use resolve_action::ResolveActionTask;
pub use resolve_provider::ResolveProviderTask;

/// Output shared by every task kind in an action solve.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    Provider(ResolvedProvider),
    Action(ResolvedAction),
    Executed(ExecutedAction),
}

impl ActionOutput {
    pub fn as_provider(&self) -> Option<&ResolvedProvider> {
        match self {
            ActionOutput::Provider(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&ResolvedAction> {
        match self {
            ActionOutput::Action(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_executed(&self) -> Option<&ExecutedAction> {
        match self {
            ActionOutput::Executed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub name: String,
    pub env: BTreeMap<String, String>,
    /// Trimmed stdout of `init_cmd`, when there is one.
    pub init_log: Option<String>,
}

/// An action with every template rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAction {
    pub action: ActionRef,
    pub version: String,
    pub provider: String,
    pub cmd: String,
    pub status_cmd: Option<String>,
    /// Provider env overlaid with the action's own env.
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedAction {
    pub action: ActionRef,
    pub version: String,
    pub outputs: BTreeMap<String, String>,
    /// Found up to date instead of being run in this solve.
    pub cached: bool,
}

/// Shared state every action task reads.
#[derive(Debug)]
pub struct TaskContext {
    pub graph: Arc<ActionGraph>,
    pub store: Arc<dyn VersionStore>,
    /// Working directory for commands.
    pub root: PathBuf,
    /// Actions whose status check is skipped.
    pub forced: HashSet<ActionRef>,
    /// Force every build action (dependencies included).
    pub force_builds: bool,
    /// Per-kind limit on concurrent `process` calls.
    pub limits: BTreeMap<ActionKind, usize>,
}

impl TaskContext {
    pub fn new(graph: Arc<ActionGraph>, store: Arc<dyn VersionStore>, root: PathBuf) -> Self {
        let limits = graph.config().project().limits.clone();
        Self {
            graph,
            store,
            root,
            forced: HashSet::new(),
            force_builds: false,
            limits,
        }
    }

    pub fn is_forced(&self, action: &ActionRef) -> bool {
        self.forced.contains(action) || (self.force_builds && action.kind == ActionKind::Build)
    }
}

/// Builds action tasks over one [`TaskContext`].
#[derive(Debug, Clone)]
pub struct TaskFactory {
    ctx: Arc<TaskContext>,
}

impl TaskFactory {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    pub fn resolve_provider(&self, name: &str) -> BoxTask<ActionOutput> {
        Arc::new(ResolveProviderTask::new(name, self.clone()))
    }

    pub fn resolve_action(&self, action: &ActionRef) -> BoxTask<ActionOutput> {
        Arc::new(ResolveActionTask::new(action.clone(), self.clone()))
    }

    pub fn execute(&self, action: &ActionRef) -> BoxTask<ActionOutput> {
        Arc::new(ExecuteTask::new(action.clone(), self.clone()))
    }

    /// Requests for the given actions, checked against the graph.
    pub fn requests(
        &self,
        actions: &[ActionRef],
        status_only: bool,
    ) -> Result<Vec<TaskRequest<ActionOutput>>> {
        actions
            .iter()
            .map(|action| {
                self.ctx.graph.require(action)?;
                let task = self.execute(action);
                Ok(if status_only {
                    TaskRequest::status_only(task)
                } else {
                    TaskRequest::new(task)
                })
            })
            .collect()
    }
}
