// src/dag/task.rs

//! The task contract consumed by the solver.
//!
//! A task knows what work exists, how to tell whether that work is already
//! done, and which other tasks it needs first. It knows nothing about when
//! or how it is scheduled.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::results::TaskResult;

/// Stable identity of a unit of work.
///
/// Two tasks with the same key are the same node in the graph, no matter
/// how many dependants discover them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey(String);

impl TaskKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for TaskKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Bounds every task output type must satisfy.
///
/// The solver never looks inside an output; it only clones it into
/// dependency maps and the final result map.
pub trait TaskOutput: Clone + Send + Sync + fmt::Debug + 'static {}

impl<T> TaskOutput for T where T: Clone + Send + Sync + fmt::Debug + 'static {}

/// Boxed future returned by the async task methods.
pub type TaskFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Shared, type-erased task handle.
pub type BoxTask<O> = Arc<dyn Task<Output = O>>;

/// Which node of a dependency the dependant waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyRole {
    /// Only the dependency's status check has to settle.
    Status,
    /// The dependency has to be processed (or found up to date).
    Process,
}

/// One dependency edge declared by a task.
pub struct TaskDependency<O> {
    pub task: BoxTask<O>,
    pub role: DependencyRole,
    /// Edge came from user configuration rather than being implied.
    pub explicit: bool,
}

impl<O> TaskDependency<O> {
    pub fn status(task: BoxTask<O>) -> Self {
        Self {
            task,
            role: DependencyRole::Status,
            explicit: false,
        }
    }

    pub fn process(task: BoxTask<O>) -> Self {
        Self {
            task,
            role: DependencyRole::Process,
            explicit: false,
        }
    }

    pub fn explicit(mut self, explicit: bool) -> Self {
        self.explicit = explicit;
        self
    }
}

impl<O> Clone for TaskDependency<O> {
    fn clone(&self) -> Self {
        Self {
            task: Arc::clone(&self.task),
            role: self.role,
            explicit: self.explicit,
        }
    }
}

impl<O: TaskOutput> fmt::Debug for TaskDependency<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDependency")
            .field("task", &self.task.key())
            .field("role", &self.role)
            .field("explicit", &self.explicit)
            .finish()
    }
}

/// Tri-state answer of a status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    /// Up to date; the carried output is used instead of processing.
    Ready,
    /// Stale; the task must be processed.
    NotReady,
    /// The task cannot tell; treated as not ready.
    Unknown,
}

#[derive(Debug, Clone)]
pub struct StatusOutcome<O> {
    pub state: StatusState,
    pub output: Option<O>,
}

impl<O> StatusOutcome<O> {
    pub fn ready(output: O) -> Self {
        Self {
            state: StatusState::Ready,
            output: Some(output),
        }
    }

    pub fn not_ready() -> Self {
        Self {
            state: StatusState::NotReady,
            output: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            state: StatusState::Unknown,
            output: None,
        }
    }

    /// Attach detail to a non-ready outcome (useful to status-only callers).
    pub fn with_output(mut self, output: O) -> Self {
        self.output = Some(output);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.state == StatusState::Ready
    }
}

/// Settled results of a task's dependencies, keyed by dependency task key.
#[derive(Debug, Clone)]
pub struct DependencyResults<O> {
    results: HashMap<TaskKey, TaskResult<O>>,
}

impl<O> Default for DependencyResults<O> {
    fn default() -> Self {
        Self {
            results: HashMap::new(),
        }
    }
}

impl<O> DependencyResults<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&TaskResult<O>> {
        self.results.get(key)
    }

    /// Output of the given dependency, if it produced one.
    pub fn output(&self, key: &str) -> Option<&O> {
        self.results.get(key).and_then(|r| r.output.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.results.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskKey, &TaskResult<O>)> {
        self.results.iter()
    }

    /// Insert a dependency result. A processed result replaces a status-only
    /// one for the same key, never the other way round.
    pub fn insert(&mut self, result: TaskResult<O>) {
        match self.results.get(&result.key) {
            Some(existing) if existing.is_processed() && !result.is_processed() => {}
            _ => {
                self.results.insert(result.key.clone(), result);
            }
        }
    }
}

/// A unit of work the solver can schedule.
///
/// Implementations are supplied per task kind (resolve-provider,
/// resolve-action, build, deploy, test, run). The solver only ever calls
/// through this trait.
pub trait Task: Send + Sync + fmt::Debug {
    type Output: TaskOutput;

    /// Stable identity. Must not depend on `force`.
    fn key(&self) -> TaskKey;

    /// Short kind name, e.g. `"build"`. Used for logging and per-kind limits.
    fn kind(&self) -> &'static str;

    /// Human readable description used in errors.
    fn description(&self) -> String {
        self.key().to_string()
    }

    /// Skip the status short-circuit for this task (not its dependencies).
    fn force(&self) -> bool {
        false
    }

    /// Tasks whose results must be settled before `get_status` runs.
    fn status_dependencies(&self) -> Vec<TaskDependency<Self::Output>> {
        Vec::new()
    }

    /// Tasks whose results must be settled before `process` runs.
    fn process_dependencies(&self) -> Vec<TaskDependency<Self::Output>> {
        Vec::new()
    }

    /// Side-effect free status check.
    fn get_status<'a>(
        &'a self,
        dependencies: &'a DependencyResults<Self::Output>,
    ) -> TaskFuture<'a, StatusOutcome<Self::Output>>;

    /// Perform the actual work.
    fn process<'a>(
        &'a self,
        dependencies: &'a DependencyResults<Self::Output>,
    ) -> TaskFuture<'a, Self::Output>;

    /// Maximum number of concurrent status checks for this task kind.
    fn status_concurrency_limit(&self) -> Option<usize> {
        None
    }

    /// Maximum number of concurrent process calls for this task kind.
    fn process_concurrency_limit(&self) -> Option<usize> {
        None
    }
}
