// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs the shell commands configured on actions and providers using
//! `tokio::process::Command`.
//!
//! - [`runner`] spawns a command, captures its output and enforces timeouts.
//! - [`duration`] parses the `timeout` strings used in config.

pub mod duration;
pub mod runner;

pub use duration::parse_duration;
pub use runner::{CommandOutput, CommandSpec, run_checked, run_command};
