// src/exec/task_instance.rs

//! One execution of a command process for one bound set of input tokens.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::{self, AuditInput, AuditOutput, AuditRecord};
use crate::engine::RunEnv;
use crate::errors::{FlowError, Result};
use crate::exec::backend::{CommandOutcome, CommandRequest};
use crate::port::Token;
use crate::template::{Phase, PlaceholderKind, PortValues, Scope, Template};

/// Suffix of the staging path a command writes an output to before it is
/// promoted to its final path.
pub const PENDING_SUFFIX: &str = ".fileflow.tmp";

/// Static, per-process part of every task instance.
#[derive(Debug)]
pub struct CommandShape {
    pub process: String,
    pub command: Template,
    pub in_ports: Vec<String>,
    /// Output port names with their path templates, in declaration order.
    pub outputs: Vec<(String, Template)>,
}

/// A fully bound invocation of a command process.
#[derive(Debug)]
pub struct TaskInstance {
    pub shape: Arc<CommandShape>,
    pub task_id: String,
    /// One token per input port, in declaration order.
    pub tokens: Vec<Token>,
}

/// Result of a successful task instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOutcome {
    /// One token per output port, in declaration order.
    pub tokens: Vec<Token>,
    /// `false` when skipped because every output already existed.
    pub executed: bool,
}

struct PlannedOutput {
    port: String,
    final_path: PathBuf,
    pending_path: PathBuf,
}

/// Staging path for a final output path.
pub fn pending_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(PENDING_SUFFIX);
    PathBuf::from(name)
}

impl TaskInstance {
    pub fn new(shape: Arc<CommandShape>, seq: usize, tokens: Vec<Token>) -> Self {
        let task_id = format!("{}-{:04}", shape.process, seq);
        Self {
            shape,
            task_id,
            tokens,
        }
    }

    pub async fn execute(self, env: &RunEnv, cancel: &CancellationToken) -> Result<InstanceOutcome> {
        let process = self.shape.process.as_str();

        let mut inputs = PortValues::declare(self.shape.in_ports.iter().cloned());
        for (port, token) in self.shape.in_ports.iter().zip(&self.tokens) {
            inputs.bind(port, token.path_str());
        }

        let planned = self.plan_outputs(env, &inputs)?;

        if env.skip_existing && planned.iter().all(|o| env.fs.is_file(&o.final_path)) {
            info!(process = %process, task = %self.task_id, "all outputs exist; skipping");
            return Ok(InstanceOutcome {
                tokens: self.output_tokens(&planned),
                executed: false,
            });
        }

        for out in &planned {
            if let Some(parent) = out.final_path.parent() {
                env.fs
                    .create_dir_all(parent)
                    .map_err(|e| FlowError::filesystem(process, parent, format!("{e:#}")))?;
            }
        }

        let mut pending = PortValues::declare(planned.iter().map(|o| o.port.clone()));
        let mut resolved = PortValues::declare(planned.iter().map(|o| o.port.clone()));
        for out in &planned {
            pending.bind(&out.port, out.pending_path.to_string_lossy());
            resolved.bind(&out.port, out.final_path.to_string_lossy());
        }

        let command = self
            .shape
            .command
            .resolve(&Scope {
                phase: Phase::Command,
                inputs: &inputs,
                pending: &pending,
                resolved: &resolved,
            })
            .map_err(|e| FlowError::binding(process, format!("command: {e}")))?;

        let request = CommandRequest {
            process: process.to_string(),
            task_id: self.task_id.clone(),
            command,
            workdir: env.workdir.clone(),
            pending_outputs: planned.iter().map(|o| o.pending_path.clone()).collect(),
        };

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FlowError::Cancelled),
            permit = env.permits.acquire() => permit
                .map_err(|e| FlowError::Other(anyhow::anyhow!("worker pool closed: {e}")))?,
        };

        let started_at = Utc::now();
        let clock = Instant::now();
        let result = env.backend.execute(&request, cancel).await;
        let finished_at = Utc::now();
        let elapsed = clock.elapsed();
        drop(permit);

        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let direct = self.direct_ports();

        let outcome = match result {
            Ok(outcome) if outcome.is_success() => outcome,
            Ok(outcome) => {
                self.discard_outputs(env, &planned, &direct);
                return Err(execution_error(&request, &outcome));
            }
            Err(FlowError::Cancelled) => {
                self.discard_outputs(env, &planned, &direct);
                return Err(FlowError::Cancelled);
            }
            Err(e) => {
                self.discard_outputs(env, &planned, &direct);
                return Err(FlowError::ExecutionError {
                    process: process.to_string(),
                    command: request.command.clone(),
                    exit_code: None,
                    output: e.to_string(),
                });
            }
        };

        if let Err(e) = self.check_outputs(env, &planned, &direct) {
            self.discard_outputs(env, &planned, &direct);
            return Err(e);
        }

        let mut produced: Vec<&Path> = Vec::with_capacity(planned.len());
        let finished = self.promote_outputs(env, &planned, &mut produced).and_then(|()| {
            let audit_inputs = self.audit_inputs(env);
            let upstream = audit::collect_upstream(env.fs.as_ref(), &audit_inputs);

            for out in &planned {
                let digest = audit::compute_file_hash(env.fs.as_ref(), &out.final_path)
                    .map_err(|e| FlowError::filesystem(process, &out.final_path, format!("{e:#}")))?;
                let record = AuditRecord {
                    process: process.to_string(),
                    task_id: self.task_id.clone(),
                    command: request.command.clone(),
                    inputs: audit_inputs.clone(),
                    output: AuditOutput {
                        port: out.port.clone(),
                        path: out.final_path.to_string_lossy().into_owned(),
                        blake3: digest,
                    },
                    started_at,
                    finished_at,
                    duration_ms,
                    exit_code: outcome.exit_code,
                    upstream: upstream.clone(),
                };
                audit::write_audit(env.fs.as_ref(), &record).map_err(|e| {
                    FlowError::filesystem(process, audit::audit_path(&out.final_path), format!("{e:#}"))
                })?;
            }
            Ok(())
        });

        if let Err(e) = finished {
            self.roll_back(env, &planned, &produced);
            return Err(e);
        }

        info!(
            process = %process,
            task = %self.task_id,
            duration_ms,
            "task instance finished"
        );

        Ok(InstanceOutcome {
            tokens: self.output_tokens(&planned),
            executed: true,
        })
    }

    /// Resolve every output path template in declaration order. Each
    /// resolved path is visible to the templates after it as `{f:port}`.
    fn plan_outputs(&self, env: &RunEnv, inputs: &PortValues) -> Result<Vec<PlannedOutput>> {
        let process = self.shape.process.as_str();
        let no_pending = PortValues::default();
        let mut resolved = PortValues::declare(self.shape.outputs.iter().map(|(n, _)| n.clone()));
        let mut planned = Vec::with_capacity(self.shape.outputs.len());

        for (port, template) in &self.shape.outputs {
            let raw = template
                .resolve(&Scope {
                    phase: Phase::PathNaming,
                    inputs,
                    pending: &no_pending,
                    resolved: &resolved,
                })
                .map_err(|e| FlowError::binding(process, format!("output '{port}': {e}")))?;

            if raw.trim().is_empty() {
                return Err(FlowError::binding(
                    process,
                    format!("output '{port}' resolved to an empty path"),
                ));
            }

            let final_path = env.resolve(Path::new(&raw));
            resolved.bind(port, final_path.to_string_lossy());
            debug!(process = %process, task = %self.task_id, port = %port, path = ?final_path, "resolved output path");

            planned.push(PlannedOutput {
                port: port.clone(),
                pending_path: pending_path(&final_path),
                final_path,
            });
        }

        Ok(planned)
    }

    /// Output ports the command writes through `{f:..}` without ever
    /// seeing their pending `{o:..}` path.
    fn direct_ports(&self) -> Vec<String> {
        let staged = self
            .shape
            .command
            .ports_where(|k| k == PlaceholderKind::PendingOutput);
        self.shape
            .command
            .ports_where(|k| k == PlaceholderKind::ResolvedOutput)
            .into_iter()
            .filter(|port| !staged.contains(port))
            .collect()
    }

    /// Every output must exist before any of them is promoted.
    fn check_outputs(&self, env: &RunEnv, planned: &[PlannedOutput], direct: &[String]) -> Result<()> {
        for out in planned {
            let present = env.fs.is_file(&out.pending_path)
                || (direct.contains(&out.port) && env.fs.is_file(&out.final_path));
            if !present {
                return Err(FlowError::filesystem(
                    self.shape.process.as_str(),
                    &out.pending_path,
                    format!("command did not produce output '{}'", out.port),
                ));
            }
        }
        Ok(())
    }

    /// Move each pending output to its final path, recording every final
    /// path this instance now owns in `produced`. Direct outputs are
    /// already in place.
    fn promote_outputs<'p>(
        &self,
        env: &RunEnv,
        planned: &'p [PlannedOutput],
        produced: &mut Vec<&'p Path>,
    ) -> Result<()> {
        for out in planned {
            if env.fs.is_file(&out.pending_path) {
                env.fs
                    .rename(&out.pending_path, &out.final_path)
                    .map_err(|e| {
                        FlowError::filesystem(self.shape.process.as_str(), &out.final_path, format!("{e:#}"))
                    })?;
            }
            produced.push(&out.final_path);
        }
        Ok(())
    }

    /// Failure before promotion: drop pending files and anything the
    /// command wrote straight to a final path.
    fn discard_outputs(&self, env: &RunEnv, planned: &[PlannedOutput], direct: &[String]) {
        for out in planned {
            self.remove_quietly(env, &out.pending_path);
            if direct.contains(&out.port) {
                self.remove_quietly(env, &out.final_path);
                self.remove_quietly(env, &audit::audit_path(&out.final_path));
            }
        }
    }

    /// Failure after promotion started: no output or audit of this
    /// instance may survive.
    fn roll_back(&self, env: &RunEnv, planned: &[PlannedOutput], produced: &[&Path]) {
        for out in planned {
            self.remove_quietly(env, &out.pending_path);
        }
        for path in produced {
            self.remove_quietly(env, path);
            self.remove_quietly(env, &audit::audit_path(path));
        }
    }

    fn remove_quietly(&self, env: &RunEnv, path: &Path) {
        if !env.fs.exists(path) {
            return;
        }
        if let Err(e) = env.fs.remove_file(path) {
            warn!(
                process = %self.shape.process,
                task = %self.task_id,
                path = ?path,
                error = %e,
                "failed to remove output of failed task instance"
            );
        }
    }

    fn audit_inputs(&self, env: &RunEnv) -> Vec<AuditInput> {
        self.shape
            .in_ports
            .iter()
            .zip(&self.tokens)
            .map(|(port, token)| AuditInput {
                port: port.clone(),
                path: env.resolve(token.path()).to_string_lossy().into_owned(),
                producer: token.origin().map(|o| o.to_string()),
            })
            .collect()
    }

    fn output_tokens(&self, planned: &[PlannedOutput]) -> Vec<Token> {
        planned
            .iter()
            .map(|o| Token::produced_by(&o.final_path, self.shape.process.as_str(), o.port.as_str()))
            .collect()
    }
}

fn execution_error(request: &CommandRequest, outcome: &CommandOutcome) -> FlowError {
    FlowError::ExecutionError {
        process: request.process.clone(),
        command: request.command.clone(),
        exit_code: outcome.exit_code,
        output: outcome.combined_output(),
    }
}
