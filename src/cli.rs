// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::action::ActionKind;
use crate::types::VersionStorageMode;

/// Command-line arguments for `actiongraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "actiongraph",
    version,
    about = "Build, deploy, test and run project actions in dependency order, skipping what is up to date.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Actiongraph.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ACTIONGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Override `[project].concurrency`.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Override `[project].version_storage` (`file` or `memory`).
    #[arg(long, value_name = "MODE")]
    pub version_storage: Option<VersionStorageMode>,

    /// Skip the status check for the requested actions.
    #[arg(long)]
    pub force: bool,

    /// Skip the status check for every build action, dependencies included.
    #[arg(long)]
    pub force_build: bool,

    /// Only report whether the requested actions are up to date.
    #[arg(long)]
    pub status_only: bool,

    /// Parse + validate, print the action graph, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Kind of action to run.
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Action names; all actions of the kind when omitted.
    #[arg(value_name = "NAMES")]
    pub names: Vec<String>,
}

/// Action kind as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Build,
    Deploy,
    Test,
    Run,
}

impl From<KindArg> for ActionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Build => ActionKind::Build,
            KindArg::Deploy => ActionKind::Deploy,
            KindArg::Test => ActionKind::Test,
            KindArg::Run => ActionKind::Run,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
