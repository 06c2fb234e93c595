// src/engine/mod.rs

//! Async shell around the bookkeeping in [`crate::dag`].
//!
//! The [`Solver`] owns one `StateManager` per solve, hands dispatchable
//! nodes to Tokio and waits for completions on a channel. All node state is
//! mutated from the solver loop only.

use crate::dag::node::NodeKey;
use crate::dag::results::ResultState;
use crate::dag::task::{BoxTask, TaskKey};
use crate::errors::GraphError;

pub mod dispatch;
pub mod limits;
pub mod solver;

pub use solver::{Solver, solve};

/// Default global concurrency limit.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// One requested task.
pub struct TaskRequest<O> {
    pub task: BoxTask<O>,
    /// Only check status; never process.
    pub status_only: bool,
}

impl<O> TaskRequest<O> {
    pub fn new(task: BoxTask<O>) -> Self {
        Self {
            task,
            status_only: false,
        }
    }

    pub fn status_only(task: BoxTask<O>) -> Self {
        Self {
            task,
            status_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveOptions {
    /// Maximum number of status / process calls in flight. Zero is treated
    /// as one.
    pub concurrency_limit: usize,
    /// Return an aggregate error when any requested task failed.
    pub throw_on_error: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            throw_on_error: false,
        }
    }
}

/// Progress notifications published while a solve runs.
#[derive(Debug, Clone)]
pub enum SolverEvent {
    SolveStarted {
        requested: Vec<TaskKey>,
    },
    NodeDispatched {
        key: NodeKey,
    },
    NodeCompleted {
        key: NodeKey,
        state: ResultState,
    },
    NodeFailed {
        key: NodeKey,
        error: GraphError,
    },
    SolveFinished {
        succeeded: usize,
        failed: usize,
    },
}
