//! Gate command execution.
//!
//! Commands run via `sh -c` in the project directory with output captured to
//! completion (not streamed). Every invocation problem is folded into a failed
//! [`GateResult`]; nothing escapes [`GateRunner::run`] as an error.

use super::GateResult;
use crate::errors::GateExecutionError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Output stored in a gate result is capped per stream; the tail is kept.
pub const MAX_CAPTURED_BYTES: usize = 16 * 1024;

/// A declared gate capability: one shell command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateCommand(String);

impl GateCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self(command.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Raw result of running a gate command to completion.
///
/// Streams are uncapped here so classifiers see the whole report; capping
/// happens when they are stored on the [`GateResult`].
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Runs gate commands sequentially against one project directory.
#[derive(Debug, Clone)]
pub struct GateRunner {
    project_dir: PathBuf,
    timeout: Duration,
}

impl GateRunner {
    pub fn new(project_dir: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Run a gate, classifying by exit status.
    ///
    /// `None` means the capability is not declared: the gate is skipped, which
    /// is not a failure.
    pub async fn run(&self, command: Option<&GateCommand>, description: &str) -> GateResult {
        self.run_with(command, description, classify_exit_status)
            .await
    }

    /// Run a gate with a custom classifier for the captured output.
    pub async fn run_with<F>(
        &self,
        command: Option<&GateCommand>,
        description: &str,
        classify: F,
    ) -> GateResult
    where
        F: FnOnce(&CommandOutput) -> GateResult,
    {
        let Some(command) = command else {
            info!(gate = description, "no command configured, skipping");
            return GateResult::skipped(format!("no {} command configured", description));
        };

        info!(gate = description, command = command.as_str(), "running gate");
        match self.execute(command).await {
            Ok(output) => {
                let mut result = classify(&output);
                result.command = Some(command.as_str().to_string());
                result.exit_code = output.exit_code;
                result.duration_ms = Some(output.duration.as_millis() as u64);
                if result.stdout.is_none() && !output.stdout.is_empty() {
                    result.stdout = Some(cap_output(&output.stdout));
                }
                if result.stderr.is_none() && !output.stderr.is_empty() {
                    result.stderr = Some(cap_output(&output.stderr));
                }
                debug!(gate = description, status = %result.status, "gate finished");
                result
            }
            Err(e) => {
                warn!(gate = description, error = %e, "gate command could not be executed");
                GateResult {
                    command: Some(command.as_str().to_string()),
                    ..GateResult::failed(e.to_string())
                }
            }
        }
    }

    /// Execute a command to completion, bounded by the runner timeout.
    pub async fn execute(&self, command: &GateCommand) -> Result<CommandOutput, GateExecutionError> {
        let start = Instant::now();
        let child = Command::new("sh")
            .arg("-c")
            .arg(command.as_str())
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GateExecutionError::Spawn {
                command: command.as_str().to_string(),
                source,
            })?;

        // Dropping the child on timeout kills it.
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| GateExecutionError::Wait {
                command: command.as_str().to_string(),
                source,
            })?,
            Err(_) => {
                return Err(GateExecutionError::TimedOut {
                    command: command.as_str().to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        })
    }
}

/// Default classification: exit status 0 passes, anything else fails.
pub fn classify_exit_status(output: &CommandOutput) -> GateResult {
    if output.success {
        GateResult::passed()
    } else {
        GateResult::failed(format!(
            "exited with code {}",
            output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown (terminated by signal)".to_string())
        ))
    }
}

/// Cap one captured stream, keeping the tail.
pub fn cap_output(text: &str) -> String {
    if text.len() <= MAX_CAPTURED_BYTES {
        return text.to_string();
    }
    let mut cut = text.len() - MAX_CAPTURED_BYTES;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    format!("[... {} bytes truncated ...]\n{}", cut, &text[cut..])
}
