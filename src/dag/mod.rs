// src/dag/mod.rs

//! Task contract and the synchronous side of the solver.
//!
//! - [`task`] defines the `Task` trait every task kind implements.
//! - [`node`] holds the scheduler-internal node types.
//! - [`graph`] is a petgraph view over non-terminal nodes (leaves, cycles).
//! - [`state_manager`] owns the node arena and all state transitions.
//! - [`results`] holds per-node outcomes and the final result map.

pub mod graph;
pub mod node;
pub mod results;
pub mod state_manager;
pub mod task;

pub use node::{NodeKey, NodeRole, NodeState, NodeTransition};
pub use results::{GraphResults, NodeOutcome, ResultState, TaskResult};
pub use state_manager::{JobOutput, StateManager};
pub use task::{
    BoxTask, DependencyResults, DependencyRole, StatusOutcome, StatusState, Task,
    TaskDependency, TaskFuture, TaskKey, TaskOutput,
};
