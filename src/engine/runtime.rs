// src/engine/runtime.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::components::{run_combinator, run_globber};
use crate::engine::{ProcessContext, ProcessReport, RunEnv, RunReport};
use crate::errors::{FlowError, Result};
use crate::exec::run_command_process;
use crate::flow::{ExecutionPlan, ProcessKind, ProcessSpec, Workflow};
use crate::port::{InPort, OutPort};

/// Wire fresh ports for `wf`, run every process as its own tokio task and
/// wait for all of them.
///
/// The first failure cancels the run; the error returned is that failure,
/// never the `Cancelled` errors it caused elsewhere.
pub(crate) async fn run_workflow(wf: &Workflow, plan: ExecutionPlan) -> Result<RunReport> {
    let started = Instant::now();
    let env = Arc::new(RunEnv {
        workdir: absolute_workdir(wf)?,
        fs: wf.filesystem(),
        backend: wf.backend(),
        permits: Arc::new(Semaphore::new(wf.max_concurrent())),
        max_concurrent: wf.max_concurrent(),
        skip_existing: wf.skip_existing(),
    });
    let cancel = CancellationToken::new();

    info!(
        workflow = %wf.name(),
        processes = plan.order.len(),
        max_concurrent = wf.max_concurrent(),
        workdir = ?env.workdir,
        "workflow run started"
    );

    let mut contexts = wire_ports(wf, &env, &cancel)?;

    let mut set = JoinSet::new();
    for (position, id) in plan.order.iter().enumerate() {
        let (Some(spec), Some(ctx)) = (wf.process(*id).cloned(), contexts[id.index()].take())
        else {
            return Err(FlowError::config(format!("unknown process handle {}", id.index())));
        };
        set.spawn(async move { (position, run_process(spec, ctx).await) });
    }

    let mut reports: Vec<(usize, ProcessReport)> = Vec::with_capacity(plan.order.len());
    let mut failure: Option<FlowError> = None;

    while let Some(joined) = set.join_next().await {
        let result = match joined {
            Ok((position, result)) => result.map(|report| (position, report)),
            // A panicking process has already cancelled the run through
            // its output ports.
            Err(e) => Err(FlowError::Other(e.into())),
        };

        match result {
            Ok(entry) => reports.push(entry),
            Err(e) => {
                cancel.cancel();
                let replace = match &failure {
                    None => true,
                    Some(current) => current.is_cancelled() && !e.is_cancelled(),
                };
                if replace {
                    failure = Some(e);
                }
            }
        }
    }

    if let Some(e) = failure {
        error!(workflow = %wf.name(), error = %e, "workflow run failed");
        return Err(e);
    }

    reports.sort_by_key(|(position, _)| *position);
    let report = RunReport {
        workflow: wf.name().to_string(),
        processes: reports.into_iter().map(|(_, r)| r).collect(),
        duration: started.elapsed(),
    };

    info!(
        workflow = %wf.name(),
        executed = report.tasks_executed(),
        skipped = report.tasks_skipped(),
        duration_ms = report.duration.as_millis() as u64,
        "workflow run finished"
    );
    Ok(report)
}

fn absolute_workdir(wf: &Workflow) -> Result<PathBuf> {
    match wf.workdir() {
        Some(dir) if dir.is_absolute() => Ok(dir.to_path_buf()),
        Some(dir) => Ok(std::env::current_dir()?.join(dir)),
        None => Ok(std::env::current_dir()?),
    }
}

/// Build one channel per connected input and hand every process its port
/// halves, indexed by process id.
fn wire_ports(
    wf: &Workflow,
    env: &Arc<RunEnv>,
    cancel: &CancellationToken,
) -> Result<Vec<Option<ProcessContext>>> {
    let specs: Vec<&ProcessSpec> = wf.processes().map(|(_, spec)| spec).collect();

    let mut outputs: Vec<Vec<OutPort>> = specs
        .iter()
        .map(|spec| {
            spec.out_ports
                .iter()
                .map(|o| OutPort::new(o.name.clone()).cancel_on_panic(cancel.clone()))
                .collect()
        })
        .collect();
    let mut inputs: Vec<Vec<Option<InPort>>> = specs
        .iter()
        .map(|spec| spec.in_ports.iter().map(|_| None).collect())
        .collect();

    for (input, output) in wf.connections() {
        let in_name = specs[input.process.index()].in_ports[input.index].clone();
        let port = outputs[output.process.index()][output.index].connect(in_name, wf.channel_capacity());
        inputs[input.process.index()][input.index] = Some(port);
        debug!(
            from = %wf.out_port_label(output)?,
            to = %wf.in_port_label(input)?,
            "wired channel"
        );
    }

    specs
        .iter()
        .zip(inputs.into_iter().zip(outputs))
        .map(|(spec, (ins, outs))| {
            let ins = ins
                .into_iter()
                .zip(&spec.in_ports)
                .map(|(port, name)| {
                    port.ok_or_else(|| {
                        FlowError::config(format!("input port {}.{} is not connected", spec.name, name))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Some(ProcessContext {
                name: spec.name.clone(),
                inputs: ins,
                outputs: outs,
                cancel: cancel.clone(),
                env: Arc::clone(env),
            }))
        })
        .collect()
}

/// Run a single process to completion.
///
/// On failure the run is cancelled before this process's ports are
/// dropped, so downstream reads fail with `Cancelled` instead of observing
/// an ordinary end of stream.
async fn run_process(spec: ProcessSpec, mut ctx: ProcessContext) -> Result<ProcessReport> {
    debug!(process = %spec.name, kind = spec.kind.label(), "process started");
    let cancel = ctx.cancel.clone();
    let env = Arc::clone(&ctx.env);

    let result = match &spec.kind {
        ProcessKind::Command(_) => return run_command_process(&spec, ctx).await,
        ProcessKind::Globber(pattern) => match ctx.outputs.first_mut() {
            Some(out) => {
                run_globber(&spec.name, pattern, &env.workdir, env.fs.as_ref(), out, &cancel).await
            }
            None => Err(FlowError::config(format!("globber '{}' has no output port", spec.name))),
        },
        ProcessKind::Combinator => {
            let inputs = std::mem::take(&mut ctx.inputs);
            run_combinator(&spec.name, inputs, &mut ctx.outputs, &cancel).await
        }
    };

    match result {
        Ok(emitted) => {
            let mut report = ProcessReport::new(spec.name.clone(), spec.kind.label());
            report.emitted = emitted;
            Ok(report)
        }
        Err(e) => {
            if !e.is_cancelled() {
                cancel.cancel();
            }
            drop(ctx);
            Err(e)
        }
    }
}
