// src/engine/dispatch.rs

//! Runs dispatched nodes on the Tokio runtime and reports back over a channel.

use std::any::Any;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::debug;

use crate::dag::node::{NodeId, NodeRole};
use crate::dag::state_manager::{DispatchJob, JobOutput};
use crate::dag::task::TaskOutput;

/// Result of one dispatched node, sent back to the solver loop.
#[derive(Debug)]
pub(crate) struct Completion<O> {
    pub id: NodeId,
    pub result: anyhow::Result<JobOutput<O>>,
}

/// Spawn the task call for `job`.
///
/// The call itself runs in a nested task so a panic in task code surfaces as
/// a `JoinError` and becomes an ordinary failure.
pub(crate) fn spawn_job<O: TaskOutput>(
    job: DispatchJob<O>,
    completion_tx: mpsc::UnboundedSender<Completion<O>>,
) {
    let DispatchJob {
        id,
        key,
        task,
        dependencies,
    } = job;

    tokio::spawn(async move {
        let role = key.role;
        let call = tokio::spawn(async move {
            match role {
                NodeRole::Status => task.get_status(&dependencies).await.map(JobOutput::Status),
                NodeRole::Process | NodeRole::Request => {
                    task.process(&dependencies).await.map(JobOutput::Processed)
                }
            }
        });

        let result = match call.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => {
                let message = panic_message(err.into_panic());
                Err(anyhow!("task panicked: {message}"))
            }
            Err(err) => Err(anyhow!("task was cancelled: {err}")),
        };

        if completion_tx.send(Completion { id, result }).is_err() {
            debug!(node = %key, "solve already finished; discarding late result");
        }
    });
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
