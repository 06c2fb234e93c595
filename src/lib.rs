// src/lib.rs

pub mod action;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod state;
pub mod tasks;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::action::{ActionGraph, ActionKind, ActionRef, classify};
use crate::cli::CliArgs;
use crate::config::loader::{load_and_validate, project_root};
use crate::dag::{GraphResults, ResultState};
use crate::engine::{SolveOptions, Solver, SolverEvent};
use crate::state::store_for_mode;
use crate::tasks::{ActionOutput, TaskContext, TaskFactory};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the action graph
/// - the version store
/// - the solver, with its events logged
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let graph = Arc::new(ActionGraph::from_config(&cfg)?);

    let kind: ActionKind = args.kind.into();
    let selected = graph.select(kind, &args.names)?;

    if args.dry_run {
        print_dry_run(&graph, &selected);
        return Ok(());
    }

    if selected.is_empty() {
        info!(kind = %kind, "no actions of this kind are configured");
        return Ok(());
    }

    let root = project_root(&config_path);
    let storage = args
        .version_storage
        .unwrap_or(cfg.project().version_storage);
    let store = store_for_mode(storage, &root);

    let mut ctx = TaskContext::new(Arc::clone(&graph), store, root);
    ctx.force_builds = args.force_build;
    if args.force {
        ctx.forced.extend(selected.iter().cloned());
    }

    let factory = TaskFactory::new(ctx);
    let requests = factory.requests(&selected, args.status_only)?;

    let options = SolveOptions {
        concurrency_limit: args.concurrency.unwrap_or(cfg.project().concurrency),
        throw_on_error: false,
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let logger = tokio::spawn(log_events(event_rx));

    let solver = Solver::new(options).with_events(event_tx);

    let results = tokio::select! {
        outcome = solver.solve(requests) => {
            match outcome {
                Ok(results) => results,
                Err(err) => err.results,
            }
        }
        _ = tokio::signal::ctrl_c() => {
            bail!("interrupted");
        }
    };

    drop(solver);
    if let Err(e) = logger.await {
        debug!(error = %e, "event logger ended abnormally");
    }

    for line in report_lines(&selected, &results) {
        println!("{line}");
    }

    let failed = results.failures().count();
    if failed > 0 {
        bail!("{failed} of {} action(s) failed", results.len());
    }

    Ok(())
}

/// Log solver progress at a level suited to each event.
async fn log_events(mut rx: mpsc::UnboundedReceiver<SolverEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SolverEvent::SolveStarted { requested } => {
                info!(?requested, "solving");
            }
            SolverEvent::NodeDispatched { key } => {
                debug!(node = %key, "dispatched");
            }
            SolverEvent::NodeCompleted { key, state } => {
                debug!(node = %key, ?state, "completed");
            }
            SolverEvent::NodeFailed { key, error } => {
                warn!(node = %key, error = %error, "failed");
            }
            SolverEvent::SolveFinished { succeeded, failed } => {
                info!(succeeded, failed, "solve finished");
            }
        }
    }
}

/// One line per requested action, in request order.
pub fn report_lines(
    actions: &[ActionRef],
    results: &GraphResults<ActionOutput>,
) -> Vec<String> {
    actions
        .iter()
        .map(|action| {
            let key = action.to_string();
            match results.get(&key) {
                Some(Ok(result)) => {
                    let version = result
                        .output
                        .as_ref()
                        .and_then(ActionOutput::as_executed)
                        .map(|e| format!(" ({})", e.version))
                        .unwrap_or_default();
                    let state = match result.state {
                        ResultState::Processed => "done",
                        ResultState::Ready => "up to date",
                        ResultState::NotReady => "outdated",
                        ResultState::Unknown => "unknown",
                    };
                    format!("{key}: {state}{version}")
                }
                Some(Err(err)) => format!("{key}: FAILED: {err}"),
                None => format!("{key}: not requested"),
            }
        })
        .collect()
}

/// Simple dry-run output: print actions, edges and commands.
fn print_dry_run(graph: &ActionGraph, selected: &[ActionRef]) {
    println!("actiongraph dry-run");
    println!(
        "  project.concurrency = {}",
        graph.config().project().concurrency
    );
    println!();

    println!("providers:");
    for (name, provider) in graph.providers() {
        println!("  - {name}");
        if !provider.dependencies.is_empty() {
            println!("      dependencies: {:?}", provider.dependencies);
        }
        if let Some(cmd) = &provider.init_cmd {
            println!("      init_cmd: {cmd}");
        }
    }
    println!();

    println!("actions ({}):", graph.len());
    for node in graph.actions() {
        let marker = if selected.contains(&node.action) { "*" } else { "-" };
        println!("  {marker} {} [{}]", node.action, node.version);
        println!("      cmd: {}", node.config.cmd);
        if let Some(status_cmd) = &node.config.status_cmd {
            println!("      status_cmd: {status_cmd}");
        }
        for (dep, edge) in node.dependencies.iter() {
            println!(
                "      depends on {dep}: {:?}{}",
                classify(edge),
                if edge.explicit { " (explicit)" } else { "" }
            );
        }
    }

    debug!("dry-run complete (no execution)");
}
