// src/config/build.rs

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, ProcessConfig, ProcessConfigKind};
use crate::errors::{FlowError, Result};
use crate::flow::Workflow;
use crate::types::{PortRef, ProcessId};

/// Turn a validated config into a ready-to-run [`Workflow`].
///
/// A relative `[workflow].workdir` is resolved against `root` (normally the
/// directory holding the config file). Every name is resolved into typed
/// handles here, so unknown ports and bad templates surface as
/// configuration errors before anything runs.
pub fn build_workflow(cfg: &ConfigFile, root: &Path) -> Result<Workflow> {
    let section = &cfg.workflow;
    let workdir = match &section.workdir {
        Some(dir) => root.join(dir),
        None => root.to_path_buf(),
    };

    let mut wf = Workflow::new(section.name.clone(), section.effective_max_concurrent())
        .with_channel_capacity(section.channel_capacity)
        .with_skip_existing(section.skip_existing)
        .with_workdir(workdir);

    let mut ids: BTreeMap<&str, ProcessId> = BTreeMap::new();
    for (name, process) in cfg.process.iter() {
        let id = register(&mut wf, name, process)?;
        ids.insert(name.as_str(), id);
    }

    for (name, process) in cfg.process.iter() {
        let id = ids[name.as_str()];
        if process.kind() == Some(ProcessConfigKind::Command) {
            set_out_paths(&mut wf, id, name, process)?;
        }
        connect_inputs(&mut wf, id, process, &ids)?;
    }

    wf.validate()?;
    Ok(wf)
}

fn register(wf: &mut Workflow, name: &str, process: &ProcessConfig) -> Result<ProcessId> {
    match (&process.cmd, &process.glob, &process.combine) {
        (Some(cmd), None, None) => wf.add_process(name, cmd),
        (None, Some(glob), None) => wf.add_globber(name, glob),
        (None, None, Some(streams)) => {
            let id = wf.add_combinator(name)?;
            for stream in streams {
                wf.add_stream(id, stream)?;
            }
            Ok(id)
        }
        _ => Err(FlowError::config(format!(
            "process '{name}' must set exactly one of `cmd`, `glob` or `combine`"
        ))),
    }
}

/// Set output path templates in port declaration order, so `{f:..}`
/// references to earlier outputs are accepted.
fn set_out_paths(
    wf: &mut Workflow,
    id: ProcessId,
    name: &str,
    process: &ProcessConfig,
) -> Result<()> {
    let declared: Vec<String> = wf
        .process(id)
        .map(|spec| spec.out_ports.iter().map(|o| o.name.clone()).collect())
        .unwrap_or_default();

    if let Some(extra) = process.out.keys().find(|k| !declared.contains(*k)) {
        return Err(FlowError::config(format!(
            "process '{name}': `out` sets '{extra}', but the command declares outputs {declared:?}"
        )));
    }

    for port in &declared {
        let template = process.out.get(port).ok_or_else(|| {
            FlowError::config(format!(
                "process '{name}': output '{port}' needs a path template in `out`"
            ))
        })?;
        wf.set_out_path(id, port, template)?;
    }
    Ok(())
}

fn connect_inputs(
    wf: &mut Workflow,
    id: ProcessId,
    process: &ProcessConfig,
    ids: &BTreeMap<&str, ProcessId>,
) -> Result<()> {
    for (port, upstream) in process.inputs.iter() {
        let target: PortRef = upstream.parse().map_err(FlowError::ConfigError)?;
        let producer = *ids.get(target.process.as_str()).ok_or_else(|| {
            FlowError::config(format!("unknown process '{}'", target.process))
        })?;

        let input = wf.in_port(id, port)?;
        let output = wf.out_port(producer, &target.port)?;
        wf.connect(input, output)?;
        debug!(from = %target, to = %port, "connected from config");
    }
    Ok(())
}
