// src/exec/runner.rs

//! Shell command runner used by the `exec` provider.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// One command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// Used in logs and errors, e.g. `build.api`.
    pub label: String,
    pub cmd: String,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(label: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            cmd: cmd.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run `spec.cmd` through the platform shell and wait for it.
///
/// A non-zero exit is *not* an error here; callers decide what it means.
/// Spawn failures and timeouts are errors. On timeout the child is killed.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput> {
    info!(label = %spec.label, cmd = %spec.cmd, "starting command");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&spec.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&spec.cmd);
        c
    };

    cmd.envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for '{}'", spec.label))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Output is decoded lossily; invalid UTF-8 must not drop the rest.
    let label = spec.label.clone();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stdout) = stdout {
            if let Err(e) = stdout.read_to_end(&mut buf).await {
                warn!(label = %label, error = %e, "failed to read stdout");
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    });

    // Always consume stderr so buffers don't fill; log at debug.
    let label = spec.label.clone();
    let stderr_task = tokio::spawn(async move {
        let mut collected = Vec::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).split(b'\n');
            while let Ok(Some(line)) = lines.next_segment().await {
                let line = String::from_utf8_lossy(&line);
                let line = line.trim_end_matches('\r');
                debug!(label = %label, "stderr: {}", line);
                collected.push(line.to_string());
            }
        }
        collected.join("\n")
    });

    let status = match spec.timeout {
        Some(limit) => {
            tokio::select! {
                status = child.wait() => status,
                _ = tokio::time::sleep(limit) => {
                    warn!(label = %spec.label, timeout = ?limit, "command timed out; killing process");
                    if let Err(e) = child.kill().await {
                        warn!(label = %spec.label, error = %e, "failed to kill timed out process");
                    }
                    bail!("'{}' timed out after {:?}", spec.label, limit);
                }
            }
        }
        None => child.wait().await,
    }
    .with_context(|| format!("waiting for process of '{}'", spec.label))?;

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    let exit_code = status.code().unwrap_or(-1);
    info!(
        label = %spec.label,
        exit_code,
        success = status.success(),
        "command exited"
    );

    Ok(CommandOutput {
        exit_code,
        success: status.success(),
        stdout,
        stderr,
    })
}

/// Like [`run_command`], but a non-zero exit becomes an error carrying the
/// tail of stderr.
pub async fn run_checked(spec: &CommandSpec) -> Result<CommandOutput> {
    let output = run_command(spec).await?;
    if !output.success {
        let tail: Vec<&str> = output.stderr.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        bail!(
            "'{}' exited with code {}{}",
            spec.label,
            output.exit_code,
            if tail.is_empty() {
                String::new()
            } else {
                format!(": {}", tail.join("\n"))
            }
        );
    }
    Ok(output)
}
