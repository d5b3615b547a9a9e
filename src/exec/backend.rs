// src/exec/backend.rs

//! Pluggable command backend abstraction.
//!
//! Task instances talk to a `CommandBackend` instead of spawning processes
//! directly. This makes it easy to swap in a fake backend in tests while
//! keeping the production implementation here.
//!
//! - [`ShellBackend`] is the default. It runs the command through the
//!   platform shell in the workflow's working directory and captures its
//!   output.
//! - Tests can provide their own `CommandBackend` that, for example, records
//!   which commands ran and writes fake output files.

use std::fmt::Debug;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{FlowError, Result};

/// A fully resolved command, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub process: String,
    pub task_id: String,
    /// Shell command text with every placeholder substituted.
    pub command: String,
    pub workdir: PathBuf,
    /// Pending paths the command is expected to write, in output port order.
    pub pending_outputs: Vec<PathBuf>,
}

/// What happened when a command ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, trimmed.
    pub fn combined_output(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim_end();
        if !out.is_empty() && !err.is_empty() {
            out.push('\n');
        }
        out.push_str(err);
        out
    }
}

/// Trait abstracting how resolved commands are executed.
///
/// Production code uses [`ShellBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
///
/// Implementations return `Ok` whenever the command ran, whatever its exit
/// status; `Err` means it could not be launched. When `cancel` fires the
/// command must be stopped and [`FlowError::Cancelled`] returned.
pub trait CommandBackend: Send + Sync + Debug {
    fn execute<'a>(
        &'a self,
        request: &'a CommandRequest,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome>> + Send + 'a>>;
}

/// Runs commands with `sh -c` (`cmd /C` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellBackend;

impl CommandBackend for ShellBackend {
    fn execute<'a>(
        &'a self,
        request: &'a CommandRequest,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                process = %request.process,
                task = %request.task_id,
                cmd = %request.command,
                "starting command"
            );

            // Build a shell command appropriate for the platform.
            let mut cmd = if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(&request.command);
                c
            } else {
                let mut c = Command::new("sh");
                c.arg("-c").arg(&request.command);
                c
            };

            cmd.current_dir(&request.workdir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let child = cmd.spawn().with_context(|| {
                format!("spawning shell for process '{}'", request.process)
            })?;

            // Dropping the wait future on cancellation kills the child.
            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(
                        process = %request.process,
                        task = %request.task_id,
                        "run cancelled; killing command"
                    );
                    return Err(FlowError::Cancelled);
                }
                output = child.wait_with_output() => output.with_context(|| {
                    format!("waiting for command of process '{}'", request.process)
                })?,
            };

            let outcome = CommandOutcome {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };

            debug!(
                process = %request.process,
                task = %request.task_id,
                exit_code = ?outcome.exit_code,
                stderr = %outcome.stderr.trim_end(),
                "command exited"
            );

            Ok(outcome)
        })
    }
}
