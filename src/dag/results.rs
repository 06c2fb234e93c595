// src/dag/results.rs

//! Node outcomes and the per-solve result store.

use std::collections::{BTreeMap, HashMap};

use crate::dag::node::NodeKey;
use crate::dag::task::{StatusOutcome, StatusState, Task, TaskKey, TaskOutput};
use crate::errors::GraphError;

/// How a successful result came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultState {
    /// Status check reported the task up to date.
    Ready,
    /// Status check reported the task stale (status-only requests).
    NotReady,
    /// Status check could not tell (status-only requests).
    Unknown,
    /// The task was processed in this solve.
    Processed,
}

impl From<StatusState> for ResultState {
    fn from(state: StatusState) -> Self {
        match state {
            StatusState::Ready => ResultState::Ready,
            StatusState::NotReady => ResultState::NotReady,
            StatusState::Unknown => ResultState::Unknown,
        }
    }
}

/// Successful outcome of a node.
#[derive(Debug, Clone)]
pub struct TaskResult<O> {
    pub key: TaskKey,
    pub description: String,
    pub state: ResultState,
    pub output: Option<O>,
}

impl<O: TaskOutput> TaskResult<O> {
    pub fn from_status(task: &dyn Task<Output = O>, status: StatusOutcome<O>) -> Self {
        Self {
            key: task.key(),
            description: task.description(),
            state: status.state.into(),
            output: status.output,
        }
    }

    pub fn processed(task: &dyn Task<Output = O>, output: O) -> Self {
        Self {
            key: task.key(),
            description: task.description(),
            state: ResultState::Processed,
            output: Some(output),
        }
    }
}

impl<O> TaskResult<O> {
    pub fn is_ready(&self) -> bool {
        self.state == ResultState::Ready
    }

    pub fn is_processed(&self) -> bool {
        self.state == ResultState::Processed
    }

    /// Whether the work is known to be done (up to date or just processed).
    pub fn is_done(&self) -> bool {
        matches!(self.state, ResultState::Ready | ResultState::Processed)
    }
}

/// Terminal outcome of any node.
pub type NodeOutcome<O> = std::result::Result<TaskResult<O>, GraphError>;

/// In-memory map from node identity to terminal outcome.
///
/// An outcome is written once; later writes for the same node are ignored so
/// a computation is never observed twice with different answers.
#[derive(Debug)]
pub(crate) struct ResultStore<O> {
    outcomes: HashMap<NodeKey, NodeOutcome<O>>,
}

impl<O> ResultStore<O> {
    pub(crate) fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
        }
    }

    /// Returns `false` if the node already had an outcome.
    pub(crate) fn record(&mut self, key: NodeKey, outcome: NodeOutcome<O>) -> bool {
        if self.outcomes.contains_key(&key) {
            return false;
        }
        self.outcomes.insert(key, outcome);
        true
    }

    pub(crate) fn get(&self, key: &NodeKey) -> Option<&NodeOutcome<O>> {
        self.outcomes.get(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.outcomes.len()
    }
}

/// Final outcome of a solve: one entry per requested task.
#[derive(Debug, Clone)]
pub struct GraphResults<O> {
    results: BTreeMap<TaskKey, NodeOutcome<O>>,
}

impl<O> Default for GraphResults<O> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
        }
    }
}

impl<O> GraphResults<O> {
    pub(crate) fn insert(&mut self, key: TaskKey, outcome: NodeOutcome<O>) {
        self.results.insert(key, outcome);
    }

    pub fn get(&self, key: &str) -> Option<&NodeOutcome<O>> {
        self.results.get(key)
    }

    /// Output of a successful entry.
    pub fn output(&self, key: &str) -> Option<&O> {
        match self.results.get(key) {
            Some(Ok(result)) => result.output.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self, key: &str) -> Option<&GraphError> {
        match self.results.get(key) {
            Some(Err(err)) => Some(err),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TaskKey> {
        self.results.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskKey, &NodeOutcome<O>)> {
        self.results.iter()
    }

    pub fn successes(&self) -> impl Iterator<Item = (&TaskKey, &TaskResult<O>)> {
        self.results
            .iter()
            .filter_map(|(k, v)| v.as_ref().ok().map(|r| (k, r)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&TaskKey, &GraphError)> {
        self.results
            .iter()
            .filter_map(|(k, v)| v.as_ref().err().map(|e| (k, e)))
    }

    pub fn has_failures(&self) -> bool {
        self.results.values().any(|v| v.is_err())
    }

    pub fn into_map(self) -> BTreeMap<TaskKey, NodeOutcome<O>> {
        self.results
    }
}
