// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ActionGraphError`] covers configuration, IO and lookup failures outside
//!   the solver.
//! - [`GraphError`] is the per-node failure recorded by the solver. It is
//!   `Clone` because one failure is shared by every dependant that observes it.
//! - [`SolveError`] is the aggregate raised by `solve` when
//!   `throw_on_error` is set.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::dag::node::NodeRole;
use crate::dag::results::GraphResults;
use crate::dag::task::{TaskKey, TaskOutput};

#[derive(Error, Debug)]
pub enum ActionGraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ActionGraphError>;

/// Terminal failure of a single solver node.
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    /// `get_status` or `process` returned an error (or panicked).
    #[error("{description} failed during {role}: {cause:#}")]
    TaskFailed {
        key: TaskKey,
        description: String,
        role: NodeRole,
        cause: Arc<anyhow::Error>,
    },

    /// A dependency failed, so this node was never dispatched.
    #[error("{description} aborted because dependency {dependency} failed")]
    DependencyFailed {
        key: TaskKey,
        description: String,
        dependency: TaskKey,
        /// Whether the edge was declared explicitly in configuration.
        explicit: bool,
        cause: Box<GraphError>,
    },

    /// The node is part of (or stuck behind) a dependency cycle.
    #[error("circular dependency detected at {key}: {}", .cycle.join(" -> "))]
    CircularDependency { key: TaskKey, cycle: Vec<String> },
}

impl GraphError {
    pub fn task_failed(
        key: TaskKey,
        description: impl Into<String>,
        role: NodeRole,
        cause: anyhow::Error,
    ) -> Self {
        GraphError::TaskFailed {
            key,
            description: description.into(),
            role,
            cause: Arc::new(cause),
        }
    }

    /// Key of the task this error was recorded for.
    pub fn key(&self) -> &TaskKey {
        match self {
            GraphError::TaskFailed { key, .. }
            | GraphError::DependencyFailed { key, .. }
            | GraphError::CircularDependency { key, .. } => key,
        }
    }

    /// Walk `DependencyFailed` wrappers down to the original failure.
    pub fn root_cause(&self) -> &GraphError {
        let mut current = self;
        while let GraphError::DependencyFailed { cause, .. } = current {
            current = cause;
        }
        current
    }

    pub fn is_circular(&self) -> bool {
        matches!(self.root_cause(), GraphError::CircularDependency { .. })
    }
}

/// Aggregate error returned by `solve` when `throw_on_error` is set and at
/// least one requested task failed.
///
/// The full result map is carried along so callers can still inspect which
/// siblings succeeded.
#[derive(Debug)]
pub struct SolveError<O: TaskOutput> {
    pub results: GraphResults<O>,
    /// Original failures (dependency wrappers stripped), one per failing task.
    pub failures: Vec<GraphError>,
}

impl<O: TaskOutput> SolveError<O> {
    pub fn new(results: GraphResults<O>) -> Self {
        let mut seen: HashSet<TaskKey> = HashSet::new();
        let mut failures = Vec::new();

        for (_, err) in results.failures() {
            let root = err.root_cause();
            if seen.insert(root.key().clone()) {
                failures.push(root.clone());
            }
        }

        Self { results, failures }
    }
}

impl<O: TaskOutput> fmt::Display for SolveError<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.results.failures().count();
        write!(
            f,
            "{} of {} requested task(s) failed",
            failed,
            self.results.len()
        )?;
        for err in &self.failures {
            write!(f, "\n  - {err}")?;
        }
        Ok(())
    }
}

impl<O: TaskOutput> std::error::Error for SolveError<O> {}
