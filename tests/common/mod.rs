#![allow(dead_code)]

use std::path::{Path, PathBuf};

use actiongraph::dag::{GraphResults, ResultState};

pub use actiongraph_test_utils::builders;
pub use actiongraph_test_utils::{
    Call, MockEvent, MockGraph, MockSpec, MockStatus, init_tracing, with_timeout,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Write `Actiongraph.toml` into `dir` and return its path.
pub fn write_project(dir: &Path, toml: &str) -> PathBuf {
    let path = dir.join("Actiongraph.toml");
    std::fs::write(&path, toml).expect("write project file");
    path
}

/// State of a successful result; panics with the error otherwise.
pub fn state_of<O: std::fmt::Debug>(results: &GraphResults<O>, key: &str) -> ResultState {
    match results.get(key) {
        Some(Ok(result)) => result.state,
        Some(Err(err)) => panic!("expected {key} to succeed, got: {err}"),
        None => panic!("no result for {key}"),
    }
}
