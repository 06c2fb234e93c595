// src/dag/node.rs

//! Scheduler-internal nodes.
//!
//! Every node wraps exactly one task in one role. Nodes live in the arena
//! owned by [`StateManager`](crate::dag::state_manager::StateManager) and
//! are dropped when the solve that created them returns.

use std::fmt;

use crate::dag::results::ResultState;
use crate::dag::task::{BoxTask, TaskKey};
use crate::errors::GraphError;

/// Role a node plays for its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRole {
    /// Root node: "the caller wants this result".
    Request,
    /// Checks whether the task's work is already done.
    Status,
    /// Performs the task's work.
    Process,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeRole::Request => "request",
            NodeRole::Status => "status",
            NodeRole::Process => "process",
        };
        f.write_str(s)
    }
}

/// Identity of a node: task key plus role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub task: TaskKey,
    pub role: NodeRole,
}

impl NodeKey {
    pub fn new(task: TaskKey, role: NodeRole) -> Self {
        Self { task, role }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.task)
    }
}

/// Execution state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Created; dependencies not all settled, or waiting for a dispatch slot.
    Pending,
    /// Dispatched; `get_status` / `process` is running.
    InProgress,
    Complete,
    Failed,
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Complete | NodeState::Failed)
    }
}

pub(crate) type NodeId = usize;

/// Where a node is in its role-specific progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Request waiting on its single target node.
    Request { status_only: bool },
    /// Status node waiting on the task's status dependencies.
    Status,
    /// Process node waiting on its own task's status check.
    AwaitingStatus,
    /// Process node waiting on the task's process dependencies.
    AwaitingDependencies,
}

/// Edge from a node to one of its dependencies.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeDependency {
    pub id: NodeId,
    pub explicit: bool,
}

pub(crate) struct GraphNode<O> {
    pub id: NodeId,
    pub key: NodeKey,
    pub task: BoxTask<O>,
    pub state: NodeState,
    pub phase: Phase,
    pub dependencies: Vec<NodeDependency>,
    /// Process dependencies known before the status check settles. Only
    /// cycle detection looks at these.
    pub declared: Vec<NodeId>,
    /// Dependencies for the current phase have been discovered.
    pub expanded: bool,
}

impl<O> GraphNode<O> {
    pub fn role(&self) -> NodeRole {
        self.key.role
    }

    /// Pending and of a kind that is handed to the executor once its
    /// dependencies settle (requests and status-waiting process nodes are
    /// resolved in bookkeeping instead).
    pub fn is_dispatchable(&self) -> bool {
        self.state == NodeState::Pending
            && self.expanded
            && matches!(self.phase, Phase::Status | Phase::AwaitingDependencies)
    }
}

/// A state change observed during bookkeeping, reported to the engine so it
/// can publish events.
#[derive(Debug, Clone)]
pub struct NodeTransition {
    pub key: NodeKey,
    pub outcome: Result<ResultState, GraphError>,
}
