// src/exec/command_process.rs

//! Driver loop of a command process.
//!
//! Bindings are formed by reading one token from every input port in
//! declaration order. Each binding becomes a [`TaskInstance`] running on its
//! own tokio task; instances run concurrently (bounded by the shared worker
//! pool), but their output tokens are emitted strictly in binding order by
//! a separate emitter task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{ProcessContext, ProcessReport, RunEnv};
use crate::errors::{FlowError, Result};
use crate::exec::task_instance::{CommandShape, InstanceOutcome, TaskInstance};
use crate::flow::ProcessSpec;
use crate::port::{InPort, OutPort, Token, send_tuple};

type InstanceHandle = JoinHandle<Result<InstanceOutcome>>;

/// Run a command process until its inputs are exhausted.
pub async fn run_command_process(spec: &ProcessSpec, ctx: ProcessContext) -> Result<ProcessReport> {
    let shape = Arc::new(command_shape(spec)?);
    let ProcessContext {
        name,
        mut inputs,
        outputs,
        cancel,
        env,
    } = ctx;

    // A failing instance cancels the whole run before any port of this
    // process closes, so downstream never mistakes a failure for the end of
    // a stream.
    let (tx, rx) = mpsc::channel::<InstanceHandle>(env.max_concurrent.max(1));

    let emitter = tokio::spawn(emit_in_order(name.clone(), rx, outputs, cancel.clone()));

    let bound = bind_inputs(&name, &shape, &mut inputs, &env, &cancel, &tx).await;
    drop(tx);
    drop(inputs);

    let emitted = emitter
        .await
        .map_err(|e| FlowError::Other(e.into()))?;

    // A real failure from the emitter beats the `Cancelled` it caused in
    // the binding loop.
    let report = match (bound, emitted) {
        (_, Err(e)) if !e.is_cancelled() => return Err(e),
        (Err(e), _) => return Err(e),
        (Ok(_), Err(e)) => return Err(e),
        (Ok(_), Ok(report)) => report,
    };

    info!(
        process = %name,
        executed = report.executed,
        skipped = report.skipped,
        "command process finished"
    );
    Ok(report)
}

fn command_shape(spec: &ProcessSpec) -> Result<CommandShape> {
    let command = spec
        .command_template()
        .ok_or_else(|| FlowError::config(format!("process '{}' is not a command", spec.name)))?
        .clone();

    let outputs = spec
        .out_ports
        .iter()
        .map(|out| {
            out.path
                .clone()
                .map(|t| (out.name.clone(), t))
                .ok_or_else(|| {
                    FlowError::config(format!(
                        "output port {}.{} has no path template",
                        spec.name, out.name
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CommandShape {
        process: spec.name.clone(),
        command,
        in_ports: spec.in_ports.clone(),
        outputs,
    })
}

/// Form bindings and spawn one task instance per binding.
///
/// Returns the number of bindings formed.
async fn bind_inputs(
    name: &str,
    shape: &Arc<CommandShape>,
    inputs: &mut [InPort],
    env: &Arc<RunEnv>,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<InstanceHandle>,
) -> Result<usize> {
    if inputs.is_empty() {
        spawn_instance(shape, 0, Vec::new(), env, cancel, tx).await?;
        return Ok(1);
    }

    let mut seq = 0;
    loop {
        let mut tokens: Vec<Token> = Vec::with_capacity(inputs.len());
        for port in inputs.iter_mut() {
            match port.recv(cancel).await? {
                Some(token) => tokens.push(token),
                None => {
                    if !tokens.is_empty() {
                        warn!(
                            process = %name,
                            closed = %port.name(),
                            discarded = tokens.len(),
                            "input closed mid-binding; discarding partial binding"
                        );
                    }
                    debug!(process = %name, bindings = seq, "inputs exhausted");
                    return Ok(seq);
                }
            }
        }

        spawn_instance(shape, seq, tokens, env, cancel, tx).await?;
        seq += 1;
    }
}

async fn spawn_instance(
    shape: &Arc<CommandShape>,
    seq: usize,
    tokens: Vec<Token>,
    env: &Arc<RunEnv>,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<InstanceHandle>,
) -> Result<()> {
    let instance = TaskInstance::new(Arc::clone(shape), seq, tokens);
    debug!(process = %shape.process, task = %instance.task_id, "binding complete");

    let env = Arc::clone(env);
    let cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        let result = instance.execute(&env, &cancel).await;
        if let Err(e) = &result {
            if !e.is_cancelled() {
                cancel.cancel();
            }
        }
        result
    });

    // The emitter only goes away after a failure; it has cancelled us.
    tx.send(handle).await.map_err(|_| FlowError::Cancelled)
}

/// Await instances in binding order and forward their output tokens.
///
/// On failure, keeps draining the remaining instances (they have been
/// cancelled) so the error returned is the one that caused the failure.
async fn emit_in_order(
    name: String,
    mut rx: mpsc::Receiver<InstanceHandle>,
    mut outputs: Vec<OutPort>,
    cancel: CancellationToken,
) -> Result<ProcessReport> {
    let mut report = ProcessReport::new(name, "command");
    let mut failure: Option<FlowError> = None;

    while let Some(handle) = rx.recv().await {
        let result = handle.await.map_err(|e| FlowError::Other(e.into())).and_then(|r| r);

        if failure.is_some() {
            if let Err(e) = result {
                if failure.as_ref().is_some_and(FlowError::is_cancelled) && !e.is_cancelled() {
                    failure = Some(e);
                }
            }
            continue;
        }

        match result {
            Ok(outcome) => {
                if outcome.executed {
                    report.executed += 1;
                } else {
                    report.skipped += 1;
                }
                if outputs.is_empty() {
                    continue;
                }
                match send_tuple(&mut outputs, outcome.tokens, &cancel).await {
                    Ok(()) => report.emitted += 1,
                    Err(e) => {
                        cancel.cancel();
                        failure = Some(e);
                    }
                }
            }
            Err(e) => {
                cancel.cancel();
                failure = Some(e);
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(report),
    }
}
