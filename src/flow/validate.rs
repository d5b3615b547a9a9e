// src/flow/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{FlowError, Result};
use crate::flow::Workflow;
use crate::flow::process::ProcessKind;
use crate::types::{InPortId, ProcessId};

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Processes in a topological order (producers before consumers).
    pub order: Vec<ProcessId>,
}

/// Check that a workflow is complete and acyclic.
///
/// - at least one process is registered,
/// - every input port is connected,
/// - every command output has a path template,
/// - every combinator has at least one stream,
/// - the process graph has no cycle.
pub fn validate_workflow(wf: &Workflow) -> Result<ExecutionPlan> {
    ensure_has_processes(wf)?;
    ensure_inputs_connected(wf)?;
    ensure_outputs_named(wf)?;
    ensure_combinators_have_streams(wf)?;
    topological_order(wf)
}

fn ensure_has_processes(wf: &Workflow) -> Result<()> {
    if wf.processes().next().is_none() {
        return Err(FlowError::config(format!(
            "workflow '{}' has no processes",
            wf.name()
        )));
    }
    Ok(())
}

fn ensure_inputs_connected(wf: &Workflow) -> Result<()> {
    for (id, spec) in wf.processes() {
        for (index, port) in spec.in_ports.iter().enumerate() {
            let input = InPortId { process: id, index };
            if wf.upstream_of(input).is_none() {
                return Err(FlowError::config(format!(
                    "input port {}.{} is not connected",
                    spec.name, port
                )));
            }
        }
    }
    Ok(())
}

fn ensure_outputs_named(wf: &Workflow) -> Result<()> {
    for (_, spec) in wf.processes() {
        if !matches!(spec.kind, ProcessKind::Command(_)) {
            continue;
        }
        if let Some(out) = spec.out_ports.iter().find(|o| o.path.is_none()) {
            return Err(FlowError::config(format!(
                "output port {}.{} has no path template (use set_out_path)",
                spec.name, out.name
            )));
        }
    }
    Ok(())
}

fn ensure_combinators_have_streams(wf: &Workflow) -> Result<()> {
    for (_, spec) in wf.processes() {
        if matches!(spec.kind, ProcessKind::Combinator) && spec.in_ports.is_empty() {
            return Err(FlowError::config(format!(
                "combinator '{}' has no streams",
                spec.name
            )));
        }
    }
    Ok(())
}

fn topological_order(wf: &Workflow) -> Result<ExecutionPlan> {
    // Edge direction: producer -> consumer.
    let mut graph: DiGraphMap<ProcessId, ()> = DiGraphMap::new();

    for (id, _) in wf.processes() {
        graph.add_node(id);
    }
    for (input, output) in wf.connections() {
        graph.add_edge(output.process(), input.process(), ());
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(ExecutionPlan { order }),
        Err(cycle) => {
            let name = wf
                .process(cycle.node_id())
                .map(|p| p.name.clone())
                .unwrap_or_default();
            Err(FlowError::config(format!(
                "cycle detected in workflow '{}' involving process '{}'",
                wf.name(),
                name
            )))
        }
    }
}
