// tests/solver_failures.rs

mod common;
use crate::common::{MockGraph, MockSpec, MockStatus, TestResult, init_tracing, with_timeout};

use actiongraph::dag::{NodeRole, ResultState};
use actiongraph::engine::solve;
use actiongraph::errors::GraphError;

#[tokio::test]
async fn task_failure_is_recorded_and_not_retried() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("A", MockSpec::new().fails("boom"));

    let results = with_timeout(solve(vec![graph.request("A")], 4, false)).await?;

    match results.error("A") {
        Some(GraphError::TaskFailed { key, role, cause, .. }) => {
            assert_eq!(key.as_str(), "A");
            assert_eq!(*role, NodeRole::Process);
            assert!(cause.to_string().contains("boom"));
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }
    assert_eq!(graph.process_calls("A"), 1);
    Ok(())
}

#[tokio::test]
async fn dependency_failure_wraps_and_skips_dependant() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("app", MockSpec::new().process_dep("lib"));
    graph.add("lib", MockSpec::new().fails("compile error"));

    let results = with_timeout(solve(vec![graph.request("app")], 4, false)).await?;

    let err = results.error("app").expect("app must fail");
    match err {
        GraphError::DependencyFailed {
            key,
            dependency,
            explicit,
            ..
        } => {
            assert_eq!(key.as_str(), "app");
            assert_eq!(dependency.as_str(), "lib");
            assert!(*explicit);
        }
        other => panic!("expected DependencyFailed, got {other:?}"),
    }
    assert_eq!(err.root_cause().key().as_str(), "lib");
    assert!(err.root_cause().to_string().contains("compile error"));
    assert!(!err.is_circular());
    assert_eq!(graph.process_calls("app"), 0);
    Ok(())
}

#[tokio::test]
async fn failure_propagates_through_a_chain() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("top", MockSpec::new().process_dep("mid"));
    graph.add("mid", MockSpec::new().process_dep("leaf"));
    graph.add("leaf", MockSpec::new().fails("disk full"));

    let results = with_timeout(solve(vec![graph.request("top")], 4, false)).await?;

    let err = results.error("top").expect("top must fail");
    assert_eq!(err.root_cause().key().as_str(), "leaf");
    match err {
        GraphError::DependencyFailed { dependency, cause, .. } => {
            assert_eq!(dependency.as_str(), "mid");
            assert!(matches!(**cause, GraphError::DependencyFailed { .. }));
        }
        other => panic!("expected DependencyFailed, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn failed_status_check_fails_the_task() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add(
        "A",
        MockSpec::new().status(MockStatus::Fail("registry unreachable".into())),
    );

    let results = with_timeout(solve(vec![graph.request("A")], 4, false)).await?;

    match results.error("A") {
        Some(GraphError::TaskFailed { role, cause, .. }) => {
            assert_eq!(*role, NodeRole::Status);
            assert!(cause.to_string().contains("registry unreachable"));
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }
    assert_eq!(graph.process_calls("A"), 0);
    Ok(())
}

#[tokio::test]
async fn panicking_task_becomes_a_failure() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("bad", MockSpec::new().panics());
    graph.add("good", MockSpec::new());

    let results = with_timeout(solve(
        vec![graph.request("bad"), graph.request("good")],
        4,
        false,
    ))
    .await?;

    let err = results.error("bad").expect("bad must fail");
    assert!(err.to_string().contains("panicked"), "got: {err}");
    assert!(matches!(results.get("good"), Some(Ok(r)) if r.state == ResultState::Processed));
    Ok(())
}

#[tokio::test]
async fn sibling_failure_does_not_affect_independent_work() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("broken", MockSpec::new().fails("boom"));
    graph.add("fine", MockSpec::new().delay_ms(20));

    let results = with_timeout(solve(
        vec![graph.request("broken"), graph.request("fine")],
        4,
        false,
    ))
    .await?;

    assert!(results.error("broken").is_some());
    assert!(results.output("fine").is_some());
    Ok(())
}

#[tokio::test]
async fn throw_on_error_raises_aggregate_after_all_work_settles() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("app", MockSpec::new().process_dep("lib"));
    graph.add("lib", MockSpec::new().fails("compile error"));
    graph.add("docs", MockSpec::new().delay_ms(30));

    let outcome = with_timeout(solve(
        vec![
            graph.request("app"),
            graph.request("lib"),
            graph.request("docs"),
        ],
        4,
        true,
    ))
    .await;

    let err = match outcome {
        Err(err) => err,
        Ok(results) => panic!("expected aggregate error, got {results:?}"),
    };

    // The full map is still there, including the sibling that succeeded.
    assert_eq!(err.results.len(), 3);
    assert!(err.results.output("docs").is_some());
    assert_eq!(graph.process_calls("docs"), 1);

    // Only the original failure is reported, once.
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].key().as_str(), "lib");

    let message = err.to_string();
    assert!(message.contains("2 of 3"), "got: {message}");
    assert!(message.contains("compile error"), "got: {message}");
    Ok(())
}

#[tokio::test]
async fn throw_on_error_is_quiet_when_everything_succeeds() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("A", MockSpec::new());

    let results = with_timeout(solve(vec![graph.request("A")], 4, true)).await?;
    assert!(!results.has_failures());
    Ok(())
}
