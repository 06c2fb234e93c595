// src/dag/state_manager.rs

//! Synchronous bookkeeping for a single solve.
//!
//! The [`StateManager`] owns the node arena and the result store. Every
//! mutation happens here, driven by the engine loop between awaits, so the
//! maps are never observed half-updated.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::PendingGraph;
use crate::dag::node::{
    GraphNode, NodeDependency, NodeId, NodeKey, NodeRole, NodeState, NodeTransition, Phase,
};
use crate::dag::results::{GraphResults, NodeOutcome, ResultState, ResultStore, TaskResult};
use crate::dag::task::{
    BoxTask, DependencyResults, DependencyRole, StatusOutcome, TaskDependency, TaskKey, TaskOutput,
};
use crate::errors::GraphError;

/// Raw result of a dispatched `get_status` / `process` call.
#[derive(Debug)]
pub enum JobOutput<O> {
    Status(StatusOutcome<O>),
    Processed(O),
}

/// Work handed to the executor for one dispatched node.
pub(crate) struct DispatchJob<O> {
    pub id: NodeId,
    pub key: NodeKey,
    pub task: BoxTask<O>,
    pub dependencies: DependencyResults<O>,
}

/// What a pending node needs next, decided from its dependencies.
enum Advance<O> {
    Wait,
    Fail(GraphError),
    Settle(NodeOutcome<O>),
    /// Request: point at the task's process node instead of its status node.
    Retarget,
    /// Process node: status was not ready, move on to process dependencies.
    NeedsProcessing,
    Dispatchable,
}

pub struct StateManager<O: TaskOutput> {
    nodes: Vec<GraphNode<O>>,
    index: HashMap<NodeKey, NodeId>,
    results: ResultStore<O>,
    requests: Vec<NodeId>,
}

impl<O: TaskOutput> Default for StateManager<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: TaskOutput> StateManager<O> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            results: ResultStore::new(),
            requests: Vec::new(),
        }
    }

    pub(crate) fn nodes(&self) -> &[GraphNode<O>] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn state_of(&self, key: &NodeKey) -> Option<NodeState> {
        self.index.get(key).map(|id| self.nodes[*id].state)
    }

    pub fn requested_keys(&self) -> Vec<TaskKey> {
        self.requests
            .iter()
            .map(|id| self.nodes[*id].key.task.clone())
            .collect()
    }

    /// Add a root request for `task`.
    ///
    /// Requests for the same key collapse into one node; a full request wins
    /// over a status-only one.
    pub fn add_request(&mut self, task: BoxTask<O>, status_only: bool) -> NodeId {
        let key = NodeKey::new(task.key(), NodeRole::Request);

        if let Some(&id) = self.index.get(&key) {
            let upgrade = matches!(
                self.nodes[id].phase,
                Phase::Request { status_only: true }
            ) && !status_only;

            if upgrade && self.nodes[id].state == NodeState::Pending {
                debug!(task = %key.task, "request upgraded from status-only");
                let target = self.initial_request_target(&task, false);
                let node = &mut self.nodes[id];
                node.phase = Phase::Request { status_only: false };
                node.dependencies = vec![NodeDependency {
                    id: target,
                    explicit: false,
                }];
            }
            return id;
        }

        let target = self.initial_request_target(&task, status_only);
        let id = self.insert_node(key, task, Phase::Request { status_only });
        let node = &mut self.nodes[id];
        node.dependencies = vec![NodeDependency {
            id: target,
            explicit: false,
        }];
        node.expanded = true;
        self.requests.push(id);
        id
    }

    /// Full requests also create the task's process node up front, so its
    /// declared dependencies take part in cycle detection before any status
    /// check is dispatched.
    fn initial_request_target(&mut self, task: &BoxTask<O>, status_only: bool) -> NodeId {
        if status_only {
            return self.ensure_node(task, NodeRole::Status);
        }

        let process = self.ensure_node(task, NodeRole::Process);
        if task.force() {
            process
        } else {
            self.ensure_node(task, NodeRole::Status)
        }
    }

    fn insert_node(&mut self, key: NodeKey, task: BoxTask<O>, phase: Phase) -> NodeId {
        let id = self.nodes.len();
        debug!(node = %key, "created node");
        self.index.insert(key.clone(), id);
        self.nodes.push(GraphNode {
            id,
            key,
            task,
            state: NodeState::Pending,
            phase,
            dependencies: Vec::new(),
            declared: Vec::new(),
            expanded: false,
        });
        id
    }

    /// Return the existing node for `(task, role)` or create it.
    fn ensure_node(&mut self, task: &BoxTask<O>, role: NodeRole) -> NodeId {
        let key = NodeKey::new(task.key(), role);
        if let Some(&id) = self.index.get(&key) {
            return id;
        }

        let phase = match role {
            NodeRole::Request => Phase::Request { status_only: false },
            NodeRole::Status => Phase::Status,
            NodeRole::Process if task.force() => Phase::AwaitingDependencies,
            NodeRole::Process => Phase::AwaitingStatus,
        };

        self.insert_node(key, Arc::clone(task), phase)
    }

    fn ensure_dependency(&mut self, dep: &TaskDependency<O>) -> NodeDependency {
        let role = match dep.role {
            DependencyRole::Status => NodeRole::Status,
            DependencyRole::Process => NodeRole::Process,
        };
        NodeDependency {
            id: self.ensure_node(&dep.task, role),
            explicit: dep.explicit,
        }
    }

    /// Discover the dependencies of a node's current phase (once per phase).
    fn expand(&mut self, id: NodeId) {
        if self.nodes[id].expanded {
            return;
        }

        let task = Arc::clone(&self.nodes[id].task);

        if self.nodes[id].phase == Phase::AwaitingStatus {
            let declared: Vec<NodeId> = task
                .process_dependencies()
                .iter()
                .map(|d| self.ensure_dependency(d).id)
                .collect();
            self.nodes[id].declared = declared;
        }

        let deps = match self.nodes[id].phase {
            Phase::Request { .. } => Vec::new(),
            Phase::Status => task
                .status_dependencies()
                .iter()
                .map(|d| self.ensure_dependency(d))
                .collect(),
            Phase::AwaitingStatus => vec![NodeDependency {
                id: self.ensure_node(&task, NodeRole::Status),
                explicit: false,
            }],
            Phase::AwaitingDependencies => task
                .process_dependencies()
                .iter()
                .map(|d| self.ensure_dependency(d))
                .collect(),
        };

        let node = &mut self.nodes[id];
        debug!(
            node = %node.key,
            dependencies = deps.len(),
            "expanded node dependencies"
        );
        node.dependencies = deps;
        node.expanded = true;
    }

    /// Run bookkeeping to a fixpoint: expand pending nodes, fail nodes with
    /// failed dependencies, settle requests and status-satisfied process
    /// nodes.
    ///
    /// Never suspends and never dispatches.
    pub fn settle(&mut self) -> Vec<NodeTransition> {
        let mut transitions = Vec::new();

        loop {
            let mut changed = false;
            let mut id = 0;

            // Nodes appended during this pass are picked up by the same pass.
            while id < self.nodes.len() {
                if self.nodes[id].state != NodeState::Pending {
                    id += 1;
                    continue;
                }

                if !self.nodes[id].expanded {
                    self.expand(id);
                    changed = true;
                }

                match self.advance(id) {
                    Advance::Wait | Advance::Dispatchable => {}
                    Advance::Fail(err) => {
                        transitions.push(self.finish(id, Err(err)));
                        changed = true;
                    }
                    Advance::Settle(outcome) => {
                        transitions.push(self.finish(id, outcome));
                        changed = true;
                    }
                    Advance::Retarget => {
                        let task = Arc::clone(&self.nodes[id].task);
                        let target = self.ensure_node(&task, NodeRole::Process);
                        debug!(task = %task.key(), "status not ready; request now waits on process node");
                        self.nodes[id].dependencies = vec![NodeDependency {
                            id: target,
                            explicit: false,
                        }];
                        changed = true;
                    }
                    Advance::NeedsProcessing => {
                        let node = &mut self.nodes[id];
                        debug!(node = %node.key, "status not ready; expanding process dependencies");
                        node.phase = Phase::AwaitingDependencies;
                        node.expanded = false;
                        node.dependencies.clear();
                        changed = true;
                    }
                }

                id += 1;
            }

            if !changed {
                break;
            }
        }

        transitions
    }

    fn advance(&self, id: NodeId) -> Advance<O> {
        let node = &self.nodes[id];

        if !node.expanded {
            return Advance::Wait;
        }

        // A full request is settled by its process node; once that has failed
        // (e.g. as part of a cycle) the status check is no longer needed.
        if matches!(node.phase, Phase::Request { status_only: false }) {
            if let Some(err) = self.failed_process(&node.key.task) {
                return Advance::Fail(err);
            }
        }

        let mut all_complete = true;
        for dep in &node.dependencies {
            let dep_node = &self.nodes[dep.id];
            match dep_node.state {
                NodeState::Failed => {
                    let err = match self.results.get(&dep_node.key) {
                        Some(Err(err)) => err.clone(),
                        _ => GraphError::task_failed(
                            dep_node.key.task.clone(),
                            dep_node.task.description(),
                            dep_node.role(),
                            anyhow::anyhow!("failed without a recorded error"),
                        ),
                    };

                    // A node fed by its own task (request or process waiting on
                    // status) reports that task's error verbatim.
                    if dep_node.key.task == node.key.task {
                        return Advance::Fail(err);
                    }

                    return Advance::Fail(GraphError::DependencyFailed {
                        key: node.key.task.clone(),
                        description: node.task.description(),
                        dependency: dep_node.key.task.clone(),
                        explicit: dep.explicit,
                        cause: Box::new(err),
                    });
                }
                NodeState::Complete => {}
                NodeState::Pending | NodeState::InProgress => all_complete = false,
            }
        }

        if !all_complete {
            return Advance::Wait;
        }

        match node.phase {
            Phase::Request { status_only } => {
                let Some(target) = node.dependencies.first() else {
                    return Advance::Wait;
                };
                let target = &self.nodes[target.id];
                let outcome = self.outcome_of(target);

                match (&outcome, target.role()) {
                    (Ok(result), NodeRole::Status)
                        if !status_only && !(result.is_ready() && !node.task.force()) =>
                    {
                        Advance::Retarget
                    }
                    _ => Advance::Settle(outcome),
                }
            }
            Phase::AwaitingStatus => {
                let Some(status) = node.dependencies.first() else {
                    return Advance::NeedsProcessing;
                };
                match self.outcome_of(&self.nodes[status.id]) {
                    Ok(result) if result.is_ready() && !node.task.force() => {
                        Advance::Settle(Ok(result))
                    }
                    Ok(_) => Advance::NeedsProcessing,
                    Err(err) => Advance::Fail(err),
                }
            }
            Phase::Status | Phase::AwaitingDependencies => Advance::Dispatchable,
        }
    }

    fn failed_process(&self, task: &TaskKey) -> Option<GraphError> {
        let key = NodeKey::new(task.clone(), NodeRole::Process);
        let id = self.index.get(&key)?;
        if self.nodes[*id].state != NodeState::Failed {
            return None;
        }
        match self.results.get(&key) {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    fn outcome_of(&self, node: &GraphNode<O>) -> NodeOutcome<O> {
        match self.results.get(&node.key) {
            Some(outcome) => outcome.clone(),
            None => Err(GraphError::task_failed(
                node.key.task.clone(),
                node.task.description(),
                node.role(),
                anyhow::anyhow!("completed without a recorded result"),
            )),
        }
    }

    /// Mark a node terminal and store its outcome.
    fn finish(&mut self, id: NodeId, outcome: NodeOutcome<O>) -> NodeTransition {
        let node = &mut self.nodes[id];
        let state = if outcome.is_ok() {
            NodeState::Complete
        } else {
            NodeState::Failed
        };
        node.state = state;

        match &outcome {
            Ok(result) => debug!(node = %node.key, state = ?result.state, "node complete"),
            Err(err) => debug!(node = %node.key, error = %err, "node failed"),
        }

        let transition = NodeTransition {
            key: node.key.clone(),
            outcome: outcome
                .as_ref()
                .map(|r| r.state)
                .map_err(|e| e.clone()),
        };

        if !self.results.record(node.key.clone(), outcome) {
            warn!(node = %node.key, "outcome already recorded; keeping the first one");
        }

        transition
    }

    pub fn all_requests_terminal(&self) -> bool {
        self.requests
            .iter()
            .all(|id| self.nodes[*id].state.is_terminal())
    }

    pub(crate) fn is_dispatchable(&self, id: NodeId) -> bool {
        self.nodes[id].is_dispatchable()
    }

    pub(crate) fn node(&self, id: NodeId) -> &GraphNode<O> {
        &self.nodes[id]
    }

    /// Non-terminal nodes that some pending request still (transitively)
    /// waits on.
    pub(crate) fn relevant(&self, graph: &PendingGraph) -> HashSet<NodeId> {
        let roots: Vec<NodeId> = self
            .requests
            .iter()
            .copied()
            .filter(|id| !self.nodes[*id].state.is_terminal())
            .collect();
        graph.reachable_from(&roots)
    }

    /// Mark a dispatchable node in progress and collect what the executor
    /// needs to run it.
    pub(crate) fn start(&mut self, id: NodeId) -> DispatchJob<O> {
        let mut dependencies = DependencyResults::new();
        for dep in &self.nodes[id].dependencies {
            if let Some(Ok(result)) = self.results.get(&self.nodes[dep.id].key) {
                dependencies.insert(result.clone());
            }
        }

        let node = &mut self.nodes[id];
        node.state = NodeState::InProgress;
        info!(
            task = %node.key.task,
            role = %node.key.role,
            kind = node.task.kind(),
            "dispatching node"
        );

        DispatchJob {
            id,
            key: node.key.clone(),
            task: Arc::clone(&node.task),
            dependencies,
        }
    }

    /// Record the outcome of a dispatched node.
    pub(crate) fn complete(
        &mut self,
        id: NodeId,
        result: anyhow::Result<JobOutput<O>>,
    ) -> Option<NodeTransition> {
        let node = &self.nodes[id];
        if node.state != NodeState::InProgress {
            warn!(node = %node.key, state = ?node.state, "completion for node that is not in progress; ignoring");
            return None;
        }

        let task = Arc::clone(&node.task);
        let role = node.role();

        let outcome = match result {
            Ok(JobOutput::Status(status)) => Ok(TaskResult::from_status(task.as_ref(), status)),
            Ok(JobOutput::Processed(output)) => Ok(TaskResult::processed(task.as_ref(), output)),
            Err(cause) => {
                warn!(task = %task.key(), role = %role, error = %format!("{cause:#}"), "task failed");
                Err(GraphError::task_failed(
                    task.key(),
                    task.description(),
                    role,
                    cause,
                ))
            }
        };

        Some(self.finish(id, outcome))
    }

    /// Fail every member of each cycle with a circular dependency error.
    pub(crate) fn fail_cycles(&mut self, cycles: &[Vec<NodeId>]) -> Vec<NodeTransition> {
        let mut transitions = Vec::new();

        for cycle in cycles {
            let mut members: Vec<String> = cycle
                .iter()
                .map(|id| self.nodes[*id].key.to_string())
                .collect();
            members.sort();
            if let Some(first) = members.first().cloned() {
                members.push(first);
            }

            warn!(cycle = %members.join(" -> "), "circular dependency detected");

            for id in cycle {
                if self.nodes[*id].state.is_terminal() {
                    continue;
                }
                let err = GraphError::CircularDependency {
                    key: self.nodes[*id].key.task.clone(),
                    cycle: members.clone(),
                };
                transitions.push(self.finish(*id, Err(err)));
            }
        }

        transitions
    }

    /// Last-resort guard: work remains but nothing can run and nothing is
    /// running. Fail the whole remainder.
    pub(crate) fn fail_stalled(&mut self, remainder: &HashSet<NodeId>) -> Vec<NodeTransition> {
        let mut ids: Vec<NodeId> = remainder.iter().copied().collect();
        ids.sort_unstable();

        let members: Vec<String> = ids
            .iter()
            .map(|id| self.nodes[*id].key.to_string())
            .collect();

        warn!(remainder = ?members, "no runnable nodes left; failing remainder as circular");

        let mut transitions = Vec::new();
        for id in ids {
            if self.nodes[id].state.is_terminal() {
                continue;
            }
            let err = GraphError::CircularDependency {
                key: self.nodes[id].key.task.clone(),
                cycle: members.clone(),
            };
            transitions.push(self.finish(id, Err(err)));
        }
        transitions
    }

    /// Collect the outcome of every request node.
    pub fn into_results(self) -> GraphResults<O> {
        let mut results = GraphResults::default();

        for id in &self.requests {
            let node = &self.nodes[*id];
            let outcome = match self.results.get(&node.key) {
                Some(outcome) => outcome.clone(),
                None => Err(GraphError::task_failed(
                    node.key.task.clone(),
                    node.task.description(),
                    NodeRole::Request,
                    anyhow::anyhow!("request did not settle"),
                )),
            };
            results.insert(node.key.task.clone(), outcome);
        }

        debug!(
            nodes = self.nodes.len(),
            stored = self.results.len(),
            "collected request results"
        );

        results
    }

    /// State of the result behind a settled request (for diagnostics).
    pub fn request_state(&self, task: &TaskKey) -> Option<Result<ResultState, GraphError>> {
        let key = NodeKey::new(task.clone(), NodeRole::Request);
        self.results
            .get(&key)
            .map(|o| o.as_ref().map(|r| r.state).map_err(|e| e.clone()))
    }
}
