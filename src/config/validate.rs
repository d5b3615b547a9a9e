// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, ProcessConfigKind, RawConfigFile};
use crate::errors::{FlowError, Result};
use crate::types::PortRef;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FlowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.workflow, raw.process))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_processes(cfg)?;
    validate_workflow_section(cfg)?;
    validate_process_kinds(cfg)?;
    validate_connections(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_processes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.process.is_empty() {
        return Err(FlowError::config(
            "config must contain at least one [process.<name>] section",
        ));
    }
    Ok(())
}

fn validate_workflow_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.workflow.max_concurrent == Some(0) {
        return Err(FlowError::config(
            "[workflow].max_concurrent must be >= 1 (got 0)",
        ));
    }
    if cfg.workflow.channel_capacity == 0 {
        return Err(FlowError::config(
            "[workflow].channel_capacity must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

fn validate_process_kinds(cfg: &RawConfigFile) -> Result<()> {
    for (name, process) in cfg.process.iter() {
        let kind = process.kind().ok_or_else(|| {
            FlowError::config(format!(
                "process '{name}' must set exactly one of `cmd`, `glob` or `combine`"
            ))
        })?;

        if kind != ProcessConfigKind::Command && !process.out.is_empty() {
            return Err(FlowError::config(format!(
                "process '{name}': `out` is only allowed on `cmd` processes"
            )));
        }

        match kind {
            ProcessConfigKind::Globber if !process.inputs.is_empty() => {
                return Err(FlowError::config(format!(
                    "process '{name}': a `glob` process has no inputs"
                )));
            }
            ProcessConfigKind::Combinator => {
                let streams = process.combine.as_deref().unwrap_or_default();
                if streams.is_empty() {
                    return Err(FlowError::config(format!(
                        "process '{name}': `combine` must list at least one stream"
                    )));
                }
                if let Some(port) = process.inputs.keys().find(|p| !streams.contains(*p)) {
                    return Err(FlowError::config(format!(
                        "process '{name}': input '{port}' is not one of the combined streams {streams:?}"
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_connections(cfg: &RawConfigFile) -> Result<()> {
    for (name, process) in cfg.process.iter() {
        for (port, upstream) in process.inputs.iter() {
            let target: PortRef = upstream.parse().map_err(|e| {
                FlowError::config(format!("process '{name}' input '{port}': {e}"))
            })?;

            if !cfg.process.contains_key(&target.process) {
                return Err(FlowError::config(format!(
                    "process '{name}' input '{port}' references unknown process '{}'",
                    target.process
                )));
            }
            if &target.process == name {
                return Err(FlowError::config(format!(
                    "process '{name}' input '{port}' cannot read from its own output"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: producer -> consumer.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.process.keys() {
        graph.add_node(name.as_str());
    }

    for (name, process) in cfg.process.iter() {
        for upstream in process.inputs.values() {
            if let Some((producer, _)) = upstream.trim().rsplit_once('.') {
                if let Some((key, _)) = cfg.process.get_key_value(producer) {
                    graph.add_edge(key.as_str(), name.as_str(), ());
                }
            }
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(FlowError::config(format!(
            "cycle detected in process graph involving process '{}'",
            cycle.node_id()
        ))),
    }
}

/// Validate an already-constructed `ConfigFile`.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    let raw = RawConfigFile {
        workflow: cfg.workflow.clone(),
        process: cfg.process.clone(),
    };
    validate_raw_config(&raw)
}
