#![allow(dead_code)]

//! Scriptable in-memory tasks for solver tests.
//!
//! A [`MockGraph`] holds one [`MockSpec`] per key and records every
//! `get_status` / `process` call. [`MockTask`]s only carry their key and a
//! handle to the graph, so dependency lists are built on demand and cycles
//! between specs do not create `Arc` cycles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;

use actiongraph::dag::{
    BoxTask, DependencyResults, DependencyRole, StatusOutcome, Task, TaskDependency, TaskFuture,
    TaskKey,
};
use actiongraph::engine::TaskRequest;

/// What `get_status` answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStatus {
    Ready(String),
    NotReady,
    Unknown,
    Fail(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MockProcess {
    Succeed(Option<String>),
    Fail(String),
    Panic,
}

#[derive(Debug, Clone)]
pub struct MockSpec {
    kind: &'static str,
    status: MockStatus,
    process: MockProcess,
    status_deps: Vec<(String, DependencyRole)>,
    process_deps: Vec<(String, DependencyRole)>,
    force: bool,
    delay: Duration,
    process_limit: Option<usize>,
}

impl Default for MockSpec {
    fn default() -> Self {
        Self {
            kind: "mock",
            status: MockStatus::NotReady,
            process: MockProcess::Succeed(None),
            status_deps: Vec::new(),
            process_deps: Vec::new(),
            force: false,
            delay: Duration::ZERO,
            process_limit: None,
        }
    }
}

impl MockSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    pub fn status(mut self, status: MockStatus) -> Self {
        self.status = status;
        self
    }

    pub fn ready(self, output: &str) -> Self {
        self.status(MockStatus::Ready(output.to_string()))
    }

    /// Output of a successful `process` (default `"<key>:processed"`).
    pub fn output(mut self, output: &str) -> Self {
        self.process = MockProcess::Succeed(Some(output.to_string()));
        self
    }

    pub fn fails(mut self, message: &str) -> Self {
        self.process = MockProcess::Fail(message.to_string());
        self
    }

    pub fn panics(mut self) -> Self {
        self.process = MockProcess::Panic;
        self
    }

    pub fn process_dep(mut self, key: &str) -> Self {
        self.process_deps
            .push((key.to_string(), DependencyRole::Process));
        self
    }

    /// Process dependency on another task's *status* node.
    pub fn process_dep_status(mut self, key: &str) -> Self {
        self.process_deps
            .push((key.to_string(), DependencyRole::Status));
        self
    }

    pub fn status_dep(mut self, key: &str) -> Self {
        self.status_deps
            .push((key.to_string(), DependencyRole::Process));
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn process_limit(mut self, limit: usize) -> Self {
        self.process_limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Status,
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Started {
        key: String,
        call: Call,
        /// Sorted keys of the dependency results handed to the call.
        deps: Vec<String>,
    },
    Finished {
        key: String,
        call: Call,
    },
}

#[derive(Debug, Default)]
pub struct MockGraph {
    specs: Mutex<HashMap<String, MockSpec>>,
    events: Mutex<Vec<MockEvent>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    running_by_kind: Mutex<HashMap<&'static str, usize>>,
    max_by_kind: Mutex<HashMap<&'static str, usize>>,
}

impl MockGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, key: &str, spec: MockSpec) {
        self.specs.lock().unwrap().insert(key.to_string(), spec);
    }

    fn spec(&self, key: &str) -> MockSpec {
        self.specs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn task(self: &Arc<Self>, key: &str) -> BoxTask<String> {
        Arc::new(MockTask {
            key: key.to_string(),
            graph: Arc::clone(self),
        })
    }

    pub fn request(self: &Arc<Self>, key: &str) -> TaskRequest<String> {
        TaskRequest::new(self.task(key))
    }

    pub fn status_request(self: &Arc<Self>, key: &str) -> TaskRequest<String> {
        TaskRequest::status_only(self.task(key))
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().unwrap().clone()
    }

    fn calls(&self, key: &str, call: Call) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MockEvent::Started { key: k, call: c, .. } if k == key && *c == call))
            .count()
    }

    pub fn process_calls(&self, key: &str) -> usize {
        self.calls(key, Call::Process)
    }

    pub fn status_calls(&self, key: &str) -> usize {
        self.calls(key, Call::Status)
    }

    /// Keys in the order their `call` started.
    pub fn started(&self, call: Call) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Started { key, call: c, .. } if c == call => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Dependency keys handed to the first `call` of `key`.
    pub fn deps_seen(&self, key: &str, call: Call) -> Option<Vec<String>> {
        self.events().into_iter().find_map(|e| match e {
            MockEvent::Started {
                key: k,
                call: c,
                deps,
            } if k == key && c == call => Some(deps),
            _ => None,
        })
    }

    /// Log position of the first `call` of `key` starting.
    pub fn started_at(&self, key: &str, call: Call) -> Option<usize> {
        self.events().iter().position(
            |e| matches!(e, MockEvent::Started { key: k, call: c, .. } if k == key && *c == call),
        )
    }

    /// Log position of the first `call` of `key` finishing.
    pub fn finished_at(&self, key: &str, call: Call) -> Option<usize> {
        self.events().iter().position(
            |e| matches!(e, MockEvent::Finished { key: k, call: c } if k == key && *c == call),
        )
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Peak number of concurrent `process` calls for one kind.
    pub fn max_concurrency_of(&self, kind: &str) -> usize {
        self.max_by_kind
            .lock()
            .unwrap()
            .get(kind)
            .copied()
            .unwrap_or(0)
    }

    fn enter(&self, key: &str, kind: &'static str, call: Call, deps: Vec<String>) {
        self.events.lock().unwrap().push(MockEvent::Started {
            key: key.to_string(),
            call,
            deps,
        });
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        if call != Call::Process {
            return;
        }
        let mut by_kind = self.running_by_kind.lock().unwrap();
        let current = by_kind.entry(kind).or_insert(0);
        *current += 1;
        let mut max = self.max_by_kind.lock().unwrap();
        let peak = max.entry(kind).or_insert(0);
        *peak = (*peak).max(*current);
    }

    fn leave(&self, key: &str, kind: &'static str, call: Call) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        if call == Call::Process {
            if let Some(n) = self.running_by_kind.lock().unwrap().get_mut(kind) {
                *n -= 1;
            }
        }
        self.events.lock().unwrap().push(MockEvent::Finished {
            key: key.to_string(),
            call,
        });
    }
}

#[derive(Debug)]
pub struct MockTask {
    key: String,
    graph: Arc<MockGraph>,
}

impl MockTask {
    fn dependencies(&self, deps: &[(String, DependencyRole)]) -> Vec<TaskDependency<String>> {
        deps.iter()
            .map(|(key, role)| TaskDependency {
                task: self.graph.task(key),
                role: *role,
                explicit: true,
            })
            .collect()
    }
}

fn dep_keys(deps: &DependencyResults<String>) -> Vec<String> {
    let mut keys: Vec<String> = deps.iter().map(|(k, _)| k.to_string()).collect();
    keys.sort();
    keys
}

impl Task for MockTask {
    type Output = String;

    fn key(&self) -> TaskKey {
        TaskKey::new(self.key.clone())
    }

    fn kind(&self) -> &'static str {
        self.graph.spec(&self.key).kind
    }

    fn force(&self) -> bool {
        self.graph.spec(&self.key).force
    }

    fn status_dependencies(&self) -> Vec<TaskDependency<String>> {
        self.dependencies(&self.graph.spec(&self.key).status_deps)
    }

    fn process_dependencies(&self) -> Vec<TaskDependency<String>> {
        self.dependencies(&self.graph.spec(&self.key).process_deps)
    }

    fn get_status<'a>(
        &'a self,
        dependencies: &'a DependencyResults<String>,
    ) -> TaskFuture<'a, StatusOutcome<String>> {
        Box::pin(async move {
            let spec = self.graph.spec(&self.key);
            self.graph
                .enter(&self.key, spec.kind, Call::Status, dep_keys(dependencies));
            if !spec.delay.is_zero() {
                tokio::time::sleep(spec.delay).await;
            }
            self.graph.leave(&self.key, spec.kind, Call::Status);

            match spec.status {
                MockStatus::Ready(output) => Ok(StatusOutcome::ready(output)),
                MockStatus::NotReady => Ok(StatusOutcome::not_ready()),
                MockStatus::Unknown => Ok(StatusOutcome::unknown()),
                MockStatus::Fail(message) => Err(anyhow!(message)),
            }
        })
    }

    fn process<'a>(
        &'a self,
        dependencies: &'a DependencyResults<String>,
    ) -> TaskFuture<'a, String> {
        Box::pin(async move {
            let spec = self.graph.spec(&self.key);
            self.graph
                .enter(&self.key, spec.kind, Call::Process, dep_keys(dependencies));
            if !spec.delay.is_zero() {
                tokio::time::sleep(spec.delay).await;
            }
            self.graph.leave(&self.key, spec.kind, Call::Process);

            match spec.process {
                MockProcess::Succeed(Some(output)) => Ok(output),
                MockProcess::Succeed(None) => Ok(format!("{}:processed", self.key)),
                MockProcess::Fail(message) => Err(anyhow!(message)),
                MockProcess::Panic => panic!("mock task {} panicked", self.key),
            }
        })
    }

    fn process_concurrency_limit(&self) -> Option<usize> {
        self.graph.spec(&self.key).process_limit
    }
}
