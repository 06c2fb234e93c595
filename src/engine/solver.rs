// src/engine/solver.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::graph::PendingGraph;
use crate::dag::node::{NodeRole, NodeTransition};
use crate::dag::results::GraphResults;
use crate::dag::state_manager::StateManager;
use crate::dag::task::TaskOutput;
use crate::errors::SolveError;

use super::dispatch::{Completion, spawn_job};
use super::limits::ConcurrencyLimiter;
use super::{SolveOptions, SolverEvent, TaskRequest};

/// Drives a set of requested tasks (and everything they depend on) to a
/// terminal state.
///
/// Each iteration of the loop:
/// - settles bookkeeping (expansion, failure propagation, request targets),
/// - fails dependency cycles,
/// - dispatches relevant leaves up to the concurrency limits,
/// - waits for at least one completion.
pub struct Solver {
    options: SolveOptions,
    events: Option<mpsc::UnboundedSender<SolverEvent>>,
}

impl fmt::Debug for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solver")
            .field("options", &self.options)
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolveOptions::default())
    }
}

impl Solver {
    pub fn new(options: SolveOptions) -> Self {
        Self {
            options,
            events: None,
        }
    }

    /// Publish [`SolverEvent`]s on `tx` while solving.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SolverEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn options(&self) -> SolveOptions {
        self.options
    }

    fn emit(&self, event: SolverEvent) {
        if let Some(tx) = &self.events {
            // Nobody listening is fine.
            let _ = tx.send(event);
        }
    }

    fn publish(&self, transitions: Vec<NodeTransition>) {
        for t in transitions {
            let event = match t.outcome {
                Ok(state) => SolverEvent::NodeCompleted { key: t.key, state },
                Err(error) => SolverEvent::NodeFailed { key: t.key, error },
            };
            self.emit(event);
        }
    }

    pub async fn solve<O: TaskOutput>(
        &self,
        requests: Vec<TaskRequest<O>>,
    ) -> Result<GraphResults<O>, SolveError<O>> {
        let mut state: StateManager<O> = StateManager::new();
        for request in requests {
            state.add_request(request.task, request.status_only);
        }

        let requested = state.requested_keys();
        info!(
            requests = requested.len(),
            concurrency = self.options.concurrency_limit,
            "solve started"
        );
        self.emit(SolverEvent::SolveStarted { requested });

        let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<Completion<O>>();
        let mut limiter = ConcurrencyLimiter::new(self.options.concurrency_limit);

        loop {
            let transitions = state.settle();
            self.publish(transitions);

            if state.all_requests_terminal() {
                break;
            }

            let graph = PendingGraph::build(state.nodes());

            let cycles = graph.cycles();
            if !cycles.is_empty() {
                let transitions = state.fail_cycles(&cycles);
                self.publish(transitions);
                continue;
            }

            let relevant = state.relevant(&graph);
            let leaves: Vec<_> = graph
                .leaves()
                .into_iter()
                .filter(|id| relevant.contains(id) && state.is_dispatchable(*id))
                .collect();

            for id in leaves {
                if !limiter.has_capacity() {
                    break;
                }

                let node = state.node(id);
                let kind = node.task.kind();
                let role = node.role();
                let class_limit = match role {
                    NodeRole::Status => node.task.status_concurrency_limit(),
                    _ => node.task.process_concurrency_limit(),
                };

                if !limiter.try_acquire(id, kind, role, class_limit) {
                    debug!(node = %node.key, kind, "kind limit reached; leaving node pending");
                    continue;
                }

                let job = state.start(id);
                self.emit(SolverEvent::NodeDispatched {
                    key: job.key.clone(),
                });
                spawn_job(job, completion_tx.clone());
            }

            if limiter.in_flight() == 0 {
                // Pending work, nothing runnable, nothing running.
                let transitions = state.fail_stalled(&relevant);
                if transitions.is_empty() {
                    warn!("solver stalled with no pending relevant nodes; giving up");
                    break;
                }
                self.publish(transitions);
                continue;
            }

            debug!(in_flight = limiter.in_flight(), "waiting for completions");

            let Some(first) = completion_rx.recv().await else {
                warn!("completion channel closed unexpectedly");
                break;
            };

            let mut completions = vec![first];
            while let Ok(next) = completion_rx.try_recv() {
                completions.push(next);
            }

            for Completion { id, result } in completions {
                limiter.release(id);
                if let Some(transition) = state.complete(id, result) {
                    self.publish(vec![transition]);
                }
            }
        }

        if limiter.in_flight() > 0 {
            debug!(
                abandoned = limiter.in_flight(),
                "requests settled; leaving unrelated in-flight work to finish on its own"
            );
        }

        let results = state.into_results();
        let failed = results.failures().count();
        let succeeded = results.len() - failed;

        info!(succeeded, failed, "solve finished");
        self.emit(SolverEvent::SolveFinished { succeeded, failed });

        if self.options.throw_on_error && failed > 0 {
            return Err(SolveError::new(results));
        }

        Ok(results)
    }
}

/// Solve `requests` with the given limit. Shorthand for
/// `Solver::new(..).solve(..)`.
pub async fn solve<O: TaskOutput>(
    requests: Vec<TaskRequest<O>>,
    concurrency_limit: usize,
    throw_on_error: bool,
) -> Result<GraphResults<O>, SolveError<O>> {
    Solver::new(SolveOptions {
        concurrency_limit,
        throw_on_error,
    })
    .solve(requests)
    .await
}
