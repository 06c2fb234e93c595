// tests/action_tasks.rs
//
// End-to-end runs of real shell commands through the action tasks.

#![cfg(unix)]

mod common;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use actiongraph::action::{ActionGraph, ActionRef};
use actiongraph::config::{ProjectConfig, load_from_str};
use actiongraph::dag::{GraphResults, ResultState};
use actiongraph::engine::{SolveOptions, Solver, SolverEvent, solve};
use actiongraph::errors::GraphError;
use actiongraph::report_lines;
use actiongraph::state::{
    FileVersionStore, MemoryVersionStore, VERSION_FILE_PATH, VersionRecord, VersionStore,
};
use actiongraph::tasks::{ActionOutput, ExecutedAction, TaskContext, TaskFactory};

fn project(toml: &str) -> ProjectConfig {
    let raw = load_from_str(toml).expect("project toml parses");
    ProjectConfig::try_from(raw).expect("project toml validates")
}

fn factory(cfg: &ProjectConfig, root: &Path, store: Arc<dyn VersionStore>) -> TaskFactory {
    let graph = Arc::new(ActionGraph::from_config(cfg).expect("action graph"));
    TaskFactory::new(TaskContext::new(graph, store, root.to_path_buf()))
}

fn refs(names: &[&str]) -> Vec<ActionRef> {
    names
        .iter()
        .map(|n| n.parse().expect("valid action ref"))
        .collect()
}

async fn run(
    factory: &TaskFactory,
    actions: &[ActionRef],
    status_only: bool,
) -> Result<GraphResults<ActionOutput>, Box<dyn std::error::Error>> {
    let requests = factory.requests(actions, status_only)?;
    Ok(with_timeout(solve(requests, 4, false)).await?)
}

fn executed<'a>(results: &'a GraphResults<ActionOutput>, key: &str) -> &'a ExecutedAction {
    results
        .output(key)
        .and_then(ActionOutput::as_executed)
        .unwrap_or_else(|| panic!("{key} has no executed output: {:?}", results.get(key)))
}

fn read(root: &Path, file: &str) -> String {
    std::fs::read_to_string(root.join(file)).unwrap_or_default()
}

#[tokio::test]
async fn action_runs_after_it_is_resolved() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[build.api]
cmd = "echo built; touch api.out"
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let solver = Solver::new(SolveOptions::default()).with_events(tx);
    let requests = factory.requests(&refs(&["build.api"]), false)?;
    let results = with_timeout(solver.solve(requests)).await?;
    drop(solver);

    let mut dispatched = Vec::new();
    while let Some(event) = rx.recv().await {
        if let SolverEvent::NodeDispatched { key } = event {
            dispatched.push(key.to_string());
        }
    }
    let position = |key: &str| {
        dispatched
            .iter()
            .position(|k| k == key)
            .unwrap_or_else(|| panic!("{key} never dispatched: {dispatched:?}"))
    };

    let resolved = position("process:resolve-action.build.api");
    assert!(position("process:resolve-provider.exec") < resolved);
    assert!(resolved < position("status:build.api"));
    assert!(position("status:build.api") < position("process:build.api"));

    let out = executed(&results, "build.api");
    assert!(!out.cached);
    assert!(out.version.starts_with("v-"));
    assert_eq!(out.outputs.get("log").map(String::as_str), Some("built"));
    assert!(dir.path().join("api.out").exists());
    Ok(())
}

#[tokio::test]
async fn passing_status_command_skips_execution() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[deploy.web]
cmd = "touch deployed"
status_cmd = "true"
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));

    let results = run(&factory, &refs(&["deploy.web"]), false).await?;

    match results.get("deploy.web") {
        Some(Ok(result)) => assert_eq!(result.state, ResultState::Ready),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(executed(&results, "deploy.web").cached);
    assert!(!dir.path().join("deployed").exists());
    Ok(())
}

#[tokio::test]
async fn status_command_decides_even_with_unreadable_version_file() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let file = dir.path().join(VERSION_FILE_PATH);
    std::fs::create_dir_all(file.parent().expect("version file has a parent"))?;
    std::fs::write(&file, "this is = = not toml")?;

    let cfg = project(
        r#"
[deploy.web]
cmd = "touch deployed"
status_cmd = "true"

[build.api]
cmd = "touch built"
"#,
    );
    let store = Arc::new(FileVersionStore::new(dir.path().to_path_buf()));
    let factory = factory(&cfg, dir.path(), store);

    let results = run(&factory, &refs(&["deploy.web", "build.api"]), false).await?;

    match results.get("deploy.web") {
        Some(Ok(result)) => assert_eq!(result.state, ResultState::Ready),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!dir.path().join("deployed").exists());

    // Without a status command the version file is needed, so the error shows.
    let err = results.error("build.api").expect("unreadable store must fail");
    assert!(format!("{err:#}").contains("loading stored version"), "got: {err:#}");
    assert!(!dir.path().join("built").exists());
    Ok(())
}

#[tokio::test]
async fn failing_status_command_runs_the_action() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[deploy.web]
cmd = "touch deployed"
status_cmd = "test -f deployed"
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));

    let first = run(&factory, &refs(&["deploy.web"]), false).await?;
    assert!(!executed(&first, "deploy.web").cached);
    assert!(dir.path().join("deployed").exists());

    let second = run(&factory, &refs(&["deploy.web"]), false).await?;
    assert!(executed(&second, "deploy.web").cached);
    Ok(())
}

#[tokio::test]
async fn unchanged_version_is_up_to_date_on_the_next_run() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let store: Arc<dyn VersionStore> = Arc::new(MemoryVersionStore::new());
    let cfg = project(
        r#"
[build.api]
cmd = "echo run >> count.txt"
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::clone(&store));

    let first = run(&factory, &refs(&["build.api"]), false).await?;
    let second = run(&factory, &refs(&["build.api"]), false).await?;

    assert!(!executed(&first, "build.api").cached);
    assert!(executed(&second, "build.api").cached);
    assert_eq!(
        executed(&first, "build.api").version,
        executed(&second, "build.api").version
    );
    assert_eq!(read(dir.path(), "count.txt").lines().count(), 1);
    Ok(())
}

#[tokio::test]
async fn changed_command_changes_the_version_and_reruns() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let store: Arc<dyn VersionStore> = Arc::new(MemoryVersionStore::new());

    let v1 = factory(
        &project("[build.api]\ncmd = \"echo one >> count.txt\"\n"),
        dir.path(),
        Arc::clone(&store),
    );
    let v2 = factory(
        &project("[build.api]\ncmd = \"echo two >> count.txt\"\n"),
        dir.path(),
        Arc::clone(&store),
    );

    let first = run(&v1, &refs(&["build.api"]), false).await?;
    let second = run(&v2, &refs(&["build.api"]), false).await?;

    assert_ne!(
        executed(&first, "build.api").version,
        executed(&second, "build.api").version
    );
    assert!(!executed(&second, "build.api").cached);
    assert_eq!(read(dir.path(), "count.txt"), "one\ntwo\n");
    Ok(())
}

#[tokio::test]
async fn forced_action_runs_even_when_up_to_date() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let store: Arc<dyn VersionStore> = Arc::new(MemoryVersionStore::new());
    let cfg = project("[build.api]\ncmd = \"echo run >> count.txt\"\n");
    let graph = Arc::new(ActionGraph::from_config(&cfg)?);
    let actions = refs(&["build.api"]);

    let plain = TaskFactory::new(TaskContext::new(
        Arc::clone(&graph),
        Arc::clone(&store),
        dir.path().to_path_buf(),
    ));
    run(&plain, &actions, false).await?;

    let mut ctx = TaskContext::new(graph, store, dir.path().to_path_buf());
    ctx.forced.extend(actions.iter().cloned());
    let forced = TaskFactory::new(ctx);
    let results = run(&forced, &actions, false).await?;

    assert!(!executed(&results, "build.api").cached);
    assert_eq!(read(dir.path(), "count.txt").lines().count(), 2);
    Ok(())
}

#[tokio::test]
async fn force_build_applies_to_build_dependencies_only() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let store: Arc<dyn VersionStore> = Arc::new(MemoryVersionStore::new());
    let cfg = project(
        r#"
[build.api]
cmd = "echo b >> build.txt"

[deploy.api]
cmd = "echo d >> deploy.txt"
dependencies = ["build.api"]
"#,
    );
    let graph = Arc::new(ActionGraph::from_config(&cfg)?);
    let actions = refs(&["deploy.api"]);

    let plain = TaskFactory::new(TaskContext::new(
        Arc::clone(&graph),
        Arc::clone(&store),
        dir.path().to_path_buf(),
    ));
    run(&plain, &actions, false).await?;

    // Only a stale deploy pulls its build dependency in again.
    let deploy_version = graph
        .get(&actions[0])
        .map(|n| n.version.clone())
        .unwrap_or_default();
    store.save(
        "deploy.api",
        &VersionRecord {
            version: format!("{deploy_version}-stale"),
            outputs: Default::default(),
        },
    )?;

    let mut ctx = TaskContext::new(graph, store, dir.path().to_path_buf());
    ctx.force_builds = true;
    run(&TaskFactory::new(ctx), &actions, false).await?;

    assert_eq!(read(dir.path(), "build.txt").lines().count(), 2);
    assert_eq!(read(dir.path(), "deploy.txt").lines().count(), 2);
    Ok(())
}

#[tokio::test]
async fn executed_outputs_are_rendered_into_dependant_env() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[build.api]
cmd = "echo api-image-42"

[deploy.web]
cmd = "printf '%s' \"$IMAGE\" > image.txt"
env = { IMAGE = "${actions.build.api.outputs.log}" }
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));

    let results = run(&factory, &refs(&["deploy.web"]), false).await?;

    assert!(!results.has_failures(), "{results:?}");
    assert_eq!(read(dir.path(), "image.txt"), "api-image-42");
    Ok(())
}

#[tokio::test]
async fn commands_see_provider_action_and_builtin_env() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[provider.cloud]
env = { REGION = "eu-north" }

[build.api]
cmd = "touch api.out"

[run.show]
cmd = "echo \"$ACTION_KIND.$ACTION_NAME $ACTION_VERSION $REGION $TAG\""
provider = "cloud"
env = { TAG = "api@${actions.build.api.version}" }
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));
    let graph = &factory.context().graph;
    let show_version = graph.require(&"run.show".parse()?)?.version.clone();
    let api_version = graph.require(&"build.api".parse()?)?.version.clone();

    let results = run(&factory, &refs(&["run.show"]), false).await?;

    let log = executed(&results, "run.show")
        .outputs
        .get("log")
        .cloned()
        .unwrap_or_default();
    assert_eq!(
        log,
        format!("run.show {show_version} eu-north api@{api_version}")
    );
    // A version reference only needs the dependency resolved, not executed.
    assert!(!dir.path().join("api.out").exists());
    Ok(())
}

#[tokio::test]
async fn failing_dependency_stops_the_dependant() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[build.lib]
cmd = "echo compiling >&2; exit 3"

[build.app]
cmd = "touch app.out"
dependencies = ["build.lib"]
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));

    let results = run(&factory, &refs(&["build.app"]), false).await?;

    let err = results.error("build.app").expect("build.app must fail");
    assert!(matches!(err, GraphError::DependencyFailed { .. }));
    let root = err.root_cause();
    assert_eq!(root.key().as_str(), "build.lib");
    let message = root.to_string();
    assert!(message.contains("exited with code 3"), "got: {message}");
    assert!(message.contains("compiling"), "got: {message}");
    assert!(!dir.path().join("app.out").exists());
    Ok(())
}

#[tokio::test]
async fn config_cycle_is_reported_per_action() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[build.a]
cmd = "true"
dependencies = ["build.b"]

[build.b]
cmd = "true"
dependencies = ["build.a"]
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));

    let results = run(&factory, &refs(&["build.a", "build.b"]), false).await?;

    for key in ["build.a", "build.b"] {
        let err = results.error(key).expect("cycle member must fail");
        assert!(err.is_circular(), "{key}: {err}");
    }
    Ok(())
}

#[tokio::test]
async fn timeout_kills_the_command() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[run.slow]
cmd = "sleep 5"
timeout = "200ms"
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));

    let results = run(&factory, &refs(&["run.slow"]), false).await?;

    let err = results.error("run.slow").expect("run.slow must time out");
    assert!(err.to_string().contains("timed out"), "got: {err}");
    Ok(())
}

#[tokio::test]
async fn provider_init_failure_fails_its_actions() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[provider.broken]
init_cmd = "exit 1"

[build.api]
cmd = "touch api.out"
provider = "broken"

[build.cli]
cmd = "touch cli.out"
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));

    let results = run(&factory, &refs(&["build.api", "build.cli"]), false).await?;

    let err = results.error("build.api").expect("build.api must fail");
    assert_eq!(err.root_cause().key().as_str(), "resolve-provider.broken");
    assert!(!dir.path().join("api.out").exists());
    assert!(dir.path().join("cli.out").exists());
    Ok(())
}

#[tokio::test]
async fn status_only_reports_without_running() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[test.unit]
cmd = "touch ran"

[test.lint]
cmd = "touch linted"
status_cmd = "true"
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));
    let actions = refs(&["test.unit", "test.lint"]);

    let results = run(&factory, &actions, true).await?;

    assert_eq!(
        report_lines(&actions, &results),
        vec![
            "test.unit: outdated".to_string(),
            format!(
                "test.lint: up to date ({})",
                executed(&results, "test.lint").version
            ),
        ]
    );
    assert!(!dir.path().join("ran").exists());
    assert!(!dir.path().join("linted").exists());
    Ok(())
}

#[tokio::test]
async fn report_lines_cover_success_and_failure() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project(
        r#"
[build.ok]
cmd = "true"

[build.bad]
cmd = "exit 7"
"#,
    );
    let factory = factory(&cfg, dir.path(), Arc::new(MemoryVersionStore::new()));
    let actions = refs(&["build.ok", "build.bad"]);

    let results = run(&factory, &actions, false).await?;
    let lines = report_lines(&actions, &results);

    let version = &executed(&results, "build.ok").version;
    assert_eq!(lines[0], format!("build.ok: done ({version})"));
    assert!(lines[1].starts_with("build.bad: FAILED: "), "got: {}", lines[1]);
    assert!(lines[1].contains("exited with code 7"), "got: {}", lines[1]);
    Ok(())
}

#[tokio::test]
async fn file_store_persists_versions_under_the_project_root() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = project("[build.api]\ncmd = \"echo hi\"\n");

    let store = Arc::new(FileVersionStore::new(dir.path().to_path_buf()));
    let factory = factory(&cfg, dir.path(), store.clone());
    run(&factory, &refs(&["build.api"]), false).await?;

    let contents = read(dir.path(), VERSION_FILE_PATH);
    assert!(contents.contains("build.api"), "got: {contents}");

    // A fresh store over the same file sees the record.
    let reopened = FileVersionStore::new(dir.path().to_path_buf());
    let record = reopened.load("build.api")?.expect("record stored");
    assert_eq!(record.outputs.get("log").map(String::as_str), Some("hi"));
    Ok(())
}
