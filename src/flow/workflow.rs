// src/flow/workflow.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::components::GlobPattern;
use crate::engine::{RunReport, runtime};
use crate::errors::{FlowError, Result};
use crate::exec::{CommandBackend, ShellBackend};
use crate::flow::process::{OutPortSpec, ProcessKind, ProcessSpec};
use crate::flow::validate::{ExecutionPlan, validate_workflow};
use crate::fs::{FileSystem, RealFileSystem};
use crate::port::DEFAULT_CHANNEL_CAPACITY;
use crate::template::{PlaceholderKind, Template};
use crate::types::{InPortId, OutPortId, ProcessId};

/// Owning context for a process graph.
///
/// Processes are registered by name and referred to afterwards through
/// typed handles ([`ProcessId`], [`InPortId`], [`OutPortId`]); string
/// lookups only happen in the `*_port` accessors. Connections are fixed
/// before [`Workflow::run`] and never change while it runs.
///
/// ```no_run
/// # async fn demo() -> fileflow::errors::Result<()> {
/// use fileflow::flow::Workflow;
///
/// let mut wf = Workflow::new("wf", 4);
/// let letters = wf.add_globber("letters", "/tmp/letterfile_*.txt")?;
/// let upper = wf.add_process("upper", "tr a-z A-Z < {i:in} > {o:out}")?;
/// wf.set_out_path(upper, "out", "{i:in}.upper")?;
/// wf.connect(wf.in_port(upper, "in")?, wf.out_port(letters, "out")?)?;
/// wf.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Workflow {
    name: String,
    max_concurrent: usize,
    channel_capacity: usize,
    workdir: Option<PathBuf>,
    skip_existing: bool,
    processes: Vec<ProcessSpec>,
    connections: BTreeMap<InPortId, OutPortId>,
    backend: Arc<dyn CommandBackend>,
    fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("max_concurrent", &self.max_concurrent)
            .field("processes", &self.processes.len())
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

impl Workflow {
    /// Create an empty workflow allowing at most `max_concurrent` commands
    /// to execute at the same time.
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        let name = name.into();
        if max_concurrent == 0 {
            warn!(workflow = %name, "max_concurrent of 0 would never run anything; using 1");
        }

        Self {
            name,
            max_concurrent: max_concurrent.max(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            workdir: None,
            skip_existing: false,
            processes: Vec::new(),
            connections: BTreeMap::new(),
            backend: Arc::new(ShellBackend),
            fs: Arc::new(RealFileSystem),
        }
    }

    /// Directory commands run in and relative paths resolve against.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Do not re-execute task instances whose final outputs all exist.
    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Replace how commands are executed (tests use a recording fake).
    pub fn with_backend(mut self, backend: Arc<dyn CommandBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn set_max_concurrent(&mut self, max_concurrent: usize) {
        self.max_concurrent = max_concurrent.max(1);
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    pub fn skip_existing(&self) -> bool {
        self.skip_existing
    }

    pub(crate) fn backend(&self) -> Arc<dyn CommandBackend> {
        Arc::clone(&self.backend)
    }

    pub(crate) fn filesystem(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.fs)
    }

    /// Register a command process. Its input and output ports are the
    /// `{i:..}` and `{o:..}`/`{f:..}` placeholders of `command`.
    pub fn add_process(&mut self, name: &str, command: &str) -> Result<ProcessId> {
        let template = Template::parse(command)
            .map_err(|e| FlowError::config(format!("process '{name}': command: {e}")))?;
        self.register(ProcessSpec::command(name.to_string(), template))
    }

    /// Register a globber process with a single `out` port.
    pub fn add_globber(&mut self, name: &str, pattern: &str) -> Result<ProcessId> {
        let pattern = GlobPattern::new(pattern)
            .map_err(|e| FlowError::config(format!("process '{name}': {e:#}")))?;
        self.register(ProcessSpec::globber(name.to_string(), pattern))
    }

    /// Register a combinator with no streams yet.
    pub fn add_combinator(&mut self, name: &str) -> Result<ProcessId> {
        self.register(ProcessSpec::combinator(name.to_string()))
    }

    /// Register a combinator stream: an input port and a same-named output
    /// port. Streams are combined in registration order, first outermost.
    pub fn add_stream(&mut self, process: ProcessId, stream: &str) -> Result<InPortId> {
        let spec = self.spec_mut(process)?;
        if !matches!(spec.kind, ProcessKind::Combinator) {
            return Err(FlowError::config(format!(
                "process '{}' is a {}, only combinators have streams",
                spec.name,
                spec.kind.label()
            )));
        }
        if spec.in_index(stream).is_some() {
            return Err(FlowError::config(format!(
                "combinator '{}' already has a stream named '{stream}'",
                spec.name
            )));
        }

        spec.in_ports.push(stream.to_string());
        spec.out_ports.push(OutPortSpec {
            name: stream.to_string(),
            path: None,
        });
        debug!(process = %spec.name, stream, "registered combinator stream");

        Ok(InPortId {
            process,
            index: spec.in_ports.len() - 1,
        })
    }

    /// Typed handle for a declared input port.
    pub fn in_port(&self, process: ProcessId, port: &str) -> Result<InPortId> {
        let spec = self.spec(process)?;
        spec.in_index(port)
            .map(|index| InPortId { process, index })
            .ok_or_else(|| {
                FlowError::config(format!(
                    "process '{}' has no input port '{port}' (declared: {:?})",
                    spec.name, spec.in_ports
                ))
            })
    }

    /// Typed handle for a declared output port.
    pub fn out_port(&self, process: ProcessId, port: &str) -> Result<OutPortId> {
        let spec = self.spec(process)?;
        spec.out_index(port)
            .map(|index| OutPortId { process, index })
            .ok_or_else(|| {
                let declared: Vec<&str> = spec.out_ports.iter().map(|p| p.name.as_str()).collect();
                FlowError::config(format!(
                    "process '{}' has no output port '{port}' (declared: {declared:?})",
                    spec.name
                ))
            })
    }

    /// Connect an input port to an output port.
    ///
    /// An input accepts exactly one connection; an output may feed any
    /// number of inputs.
    pub fn connect(&mut self, input: InPortId, output: OutPortId) -> Result<()> {
        let in_name = self.in_port_label(input)?;
        let out_name = self.out_port_label(output)?;

        if input.process == output.process {
            return Err(FlowError::config(format!(
                "cannot connect {in_name} to {out_name}: both ports belong to the same process"
            )));
        }

        if let Some(existing) = self.connections.get(&input) {
            return Err(FlowError::config(format!(
                "input {in_name} is already connected to {}",
                self.out_port_label(*existing)?
            )));
        }

        debug!(from = %out_name, to = %in_name, "connecting ports");
        self.connections.insert(input, output);
        Ok(())
    }

    /// Set the path template of a command process's output port.
    ///
    /// The template may use the process's inputs (`{i:..}`) and outputs
    /// declared before this one (`{f:..}`).
    pub fn set_out_path(&mut self, process: ProcessId, port: &str, template: &str) -> Result<()> {
        let out = self.out_port(process, port)?;
        let spec = self.spec(process)?;

        if !matches!(spec.kind, ProcessKind::Command(_)) {
            return Err(FlowError::config(format!(
                "process '{}' is a {}; output paths can only be set on command processes",
                spec.name,
                spec.kind.label()
            )));
        }

        let parsed = Template::parse(template).map_err(|e| {
            FlowError::config(format!("process '{}' output '{port}': {e}", spec.name))
        })?;

        for p in parsed.placeholders() {
            let ok = match p.kind {
                PlaceholderKind::Input => spec.in_index(&p.port).is_some(),
                PlaceholderKind::PendingOutput => false,
                PlaceholderKind::ResolvedOutput => {
                    spec.out_index(&p.port).is_some_and(|idx| idx < out.index)
                }
            };
            if !ok {
                return Err(FlowError::config(format!(
                    "process '{}' output '{port}': placeholder {{{}:{}}} is not available when naming outputs \
                     (inputs: {:?}; only outputs declared before '{port}' may be referenced with 'f')",
                    spec.name, p.kind, p.port, spec.in_ports
                )));
            }
        }

        self.spec_mut(process)?.out_ports[out.index].path = Some(parsed);
        Ok(())
    }

    /// Look up a process by name.
    pub fn process_id(&self, name: &str) -> Option<ProcessId> {
        self.processes
            .iter()
            .position(|p| p.name == name)
            .map(ProcessId)
    }

    pub fn process(&self, id: ProcessId) -> Option<&ProcessSpec> {
        self.processes.get(id.0)
    }

    pub fn processes(&self) -> impl Iterator<Item = (ProcessId, &ProcessSpec)> {
        self.processes.iter().enumerate().map(|(i, p)| (ProcessId(i), p))
    }

    /// All connections as `(input, output)` pairs.
    pub fn connections(&self) -> impl Iterator<Item = (InPortId, OutPortId)> + '_ {
        self.connections.iter().map(|(i, o)| (*i, *o))
    }

    pub fn upstream_of(&self, input: InPortId) -> Option<OutPortId> {
        self.connections.get(&input).copied()
    }

    /// `process.port` label of an input handle, for messages.
    pub fn in_port_label(&self, id: InPortId) -> Result<String> {
        let spec = self.spec(id.process)?;
        let port = spec
            .in_ports
            .get(id.index)
            .ok_or_else(|| FlowError::config(format!("stale input handle on '{}'", spec.name)))?;
        Ok(format!("{}.{}", spec.name, port))
    }

    /// `process.port` label of an output handle, for messages.
    pub fn out_port_label(&self, id: OutPortId) -> Result<String> {
        let spec = self.spec(id.process)?;
        let port = spec
            .out_ports
            .get(id.index)
            .ok_or_else(|| FlowError::config(format!("stale output handle on '{}'", spec.name)))?;
        Ok(format!("{}.{}", spec.name, port.name))
    }

    /// Check the graph without running it.
    pub fn validate(&self) -> Result<ExecutionPlan> {
        validate_workflow(self)
    }

    /// Run every process to completion.
    ///
    /// Returns the first fatal error of the run; in that case every other
    /// process is cancelled before this returns. The workflow can be run
    /// again afterwards.
    pub async fn run(&self) -> Result<RunReport> {
        let plan = self.validate()?;
        runtime::run_workflow(self, plan).await
    }

    fn register(&mut self, spec: ProcessSpec) -> Result<ProcessId> {
        if spec.name.trim().is_empty() {
            return Err(FlowError::config("process names must not be empty"));
        }
        if self.process_id(&spec.name).is_some() {
            return Err(FlowError::config(format!(
                "a process named '{}' is already registered",
                spec.name
            )));
        }

        debug!(
            workflow = %self.name,
            process = %spec.name,
            kind = spec.kind.label(),
            inputs = ?spec.in_ports,
            "registered process"
        );
        self.processes.push(spec);
        Ok(ProcessId(self.processes.len() - 1))
    }

    fn spec(&self, id: ProcessId) -> Result<&ProcessSpec> {
        self.processes
            .get(id.0)
            .ok_or_else(|| FlowError::config(format!("unknown process handle {}", id.0)))
    }

    fn spec_mut(&mut self, id: ProcessId) -> Result<&mut ProcessSpec> {
        self.processes
            .get_mut(id.0)
            .ok_or_else(|| FlowError::config(format!("unknown process handle {}", id.0)))
    }
}
