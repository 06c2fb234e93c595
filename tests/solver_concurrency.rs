// tests/solver_concurrency.rs

mod common;
use crate::common::{MockGraph, MockSpec, TestResult, init_tracing, with_timeout};

use tokio::sync::mpsc;

use actiongraph::dag::{NodeRole, ResultState};
use actiongraph::engine::{SolveOptions, Solver, SolverEvent, solve};

#[tokio::test]
async fn global_limit_is_never_exceeded() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    let mut requests = Vec::new();
    for i in 0..10 {
        let key = format!("job{i}");
        graph.add(&key, MockSpec::new().delay_ms(15));
        requests.push(graph.request(&key));
    }

    let results = with_timeout(solve(requests, 3, false)).await?;

    assert_eq!(results.len(), 10);
    assert!(!results.has_failures());
    let peak = graph.max_concurrency();
    assert!(peak <= 3, "peak concurrency {peak} exceeded limit");
    assert!(peak >= 2, "independent work should overlap, peak was {peak}");
    Ok(())
}

#[tokio::test]
async fn per_kind_process_limit_is_respected() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    let mut requests = Vec::new();
    for i in 0..4 {
        let key = format!("deploy{i}");
        graph.add(
            &key,
            MockSpec::new().kind("deploy").process_limit(1).delay_ms(10),
        );
        requests.push(graph.request(&key));
    }
    for i in 0..4 {
        let key = format!("build{i}");
        graph.add(&key, MockSpec::new().kind("build").delay_ms(10));
        requests.push(graph.request(&key));
    }

    let results = with_timeout(solve(requests, 8, false)).await?;

    assert!(!results.has_failures());
    assert_eq!(graph.max_concurrency_of("deploy"), 1);
    assert!(graph.max_concurrency_of("build") >= 2);
    Ok(())
}

#[tokio::test]
async fn zero_limit_still_makes_progress() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("A", MockSpec::new().process_dep("B"));
    graph.add("B", MockSpec::new());

    let results = with_timeout(solve(vec![graph.request("A"), graph.request("B")], 0, false))
        .await?;

    assert!(!results.has_failures());
    assert_eq!(graph.max_concurrency(), 1);
    Ok(())
}

#[tokio::test]
async fn solver_publishes_progress_events() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("A", MockSpec::new().process_dep("B"));
    graph.add("B", MockSpec::new().fails("boom"));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let solver = Solver::new(SolveOptions {
        concurrency_limit: 2,
        throw_on_error: false,
    })
    .with_events(tx);

    let results = with_timeout(solver.solve(vec![graph.request("A")])).await?;
    drop(solver);
    assert!(results.error("A").is_some());

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(
        events.first(),
        Some(SolverEvent::SolveStarted { requested }) if requested.len() == 1
    ));
    assert!(matches!(
        events.last(),
        Some(SolverEvent::SolveFinished { succeeded: 0, failed: 1 })
    ));

    let dispatched: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            SolverEvent::NodeDispatched { key } => Some(key.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(dispatched, vec!["status:A", "status:B", "process:B"]);

    assert!(events.iter().any(|e| matches!(
        e,
        SolverEvent::NodeCompleted { key, state: ResultState::NotReady }
            if key.task.as_str() == "B" && key.role == NodeRole::Status
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        SolverEvent::NodeFailed { key, .. }
            if key.task.as_str() == "A" && key.role == NodeRole::Request
    )));
    Ok(())
}
