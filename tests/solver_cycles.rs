mod common;
use crate::common::{MockGraph, MockSpec, TestResult, init_tracing, with_timeout};

use actiongraph::engine::solve;
use actiongraph::errors::GraphError;

#[tokio::test]
async fn mutual_dependency_fails_both_members_without_dispatching() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("A", MockSpec::new().process_dep("B"));
    graph.add("B", MockSpec::new().process_dep("A"));

    let results = with_timeout(solve(
        vec![graph.request("A"), graph.request("B")],
        4,
        false,
    ))
    .await?;

    for key in ["A", "B"] {
        let err = results.error(key).expect("cycle member must fail");
        assert!(err.is_circular(), "{key}: {err}");
        assert_eq!(graph.status_calls(key), 0, "{key} status must never be checked");
        assert_eq!(graph.process_calls(key), 0, "{key} must never be processed");
    }
    assert!(graph.events().is_empty(), "got {:?}", graph.events());

    match results.error("A") {
        Some(GraphError::CircularDependency { cycle, .. }) => {
            assert_eq!(cycle, &vec!["process:A", "process:B", "process:A"]);
        }
        other => panic!("expected CircularDependency, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn forced_cycle_dispatches_nothing() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("A", MockSpec::new().force().process_dep("B"));
    graph.add("B", MockSpec::new().force().process_dep("A"));

    let results = with_timeout(solve(vec![graph.request("A")], 4, false)).await?;

    assert!(results.error("A").is_some_and(GraphError::is_circular));
    assert!(graph.events().is_empty(), "got {:?}", graph.events());
    Ok(())
}

#[tokio::test]
async fn self_dependency_is_a_cycle() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("loop", MockSpec::new().process_dep("loop"));

    let results = with_timeout(solve(vec![graph.request("loop")], 4, false)).await?;

    let err = results.error("loop").expect("self cycle must fail");
    assert!(err.is_circular());
    assert!(err.to_string().contains("process:loop -> process:loop"));
    assert!(graph.events().is_empty(), "got {:?}", graph.events());
    Ok(())
}

#[tokio::test]
async fn dependant_of_a_cycle_fails_with_circular_root() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("app", MockSpec::new().process_dep("A"));
    graph.add("A", MockSpec::new().process_dep("B"));
    graph.add("B", MockSpec::new().process_dep("A"));
    graph.add("unrelated", MockSpec::new());

    let results = with_timeout(solve(
        vec![graph.request("app"), graph.request("unrelated")],
        4,
        false,
    ))
    .await?;

    let err = results.error("app").expect("app must fail");
    assert!(matches!(err, GraphError::DependencyFailed { .. }));
    assert!(err.is_circular());
    assert_eq!(graph.process_calls("app"), 0);
    assert_eq!(graph.status_calls("A"), 0);
    assert_eq!(graph.status_calls("B"), 0);

    // Work outside the cycle still happens.
    assert!(results.output("unrelated").is_some());
    Ok(())
}

#[tokio::test]
async fn cycle_through_status_dependencies_terminates() -> TestResult {
    init_tracing();
    let graph = MockGraph::new();
    graph.add("A", MockSpec::new().status_dep("B"));
    graph.add("B", MockSpec::new().status_dep("A"));

    let results = with_timeout(solve(vec![graph.request("A")], 4, false)).await?;

    assert!(results.error("A").is_some_and(GraphError::is_circular));
    assert_eq!(graph.process_calls("A"), 0);
    assert_eq!(graph.process_calls("B"), 0);
    Ok(())
}
