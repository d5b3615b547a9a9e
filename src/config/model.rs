// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::port::DEFAULT_CHANNEL_CAPACITY;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [workflow]
/// name = "combine"
/// max_concurrent = 4
///
/// [process.letters]
/// glob = "data/letterfile_*.txt"
///
/// [process.numbers]
/// glob = "data/numberfile_*.txt"
///
/// [process.combiner]
/// combine = ["letters", "numbers"]
/// in = { letters = "letters.out", numbers = "numbers.out" }
///
/// [process.cat]
/// cmd = "cat {i:letters} {i:numbers} > {o:combined}"
/// in = { letters = "combiner.letters", numbers = "combiner.numbers" }
/// out = { combined = "out/{i:letters|basename|%.txt}.{i:numbers|basename|%.txt}.combined.txt" }
/// ```
///
/// Use `ConfigFile::try_from(raw)` to validate it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Workflow-wide settings from `[workflow]`.
    #[serde(default)]
    pub workflow: WorkflowSection,

    /// All processes from `[process.<name>]`, keyed by process name.
    #[serde(default)]
    pub process: BTreeMap<String, ProcessConfig>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub workflow: WorkflowSection,
    pub process: BTreeMap<String, ProcessConfig>,
}

impl ConfigFile {
    /// Wrap sections that have already been validated.
    pub(crate) fn new_unchecked(
        workflow: WorkflowSection,
        process: BTreeMap<String, ProcessConfig>,
    ) -> Self {
        Self { workflow, process }
    }
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowSection {
    #[serde(default = "default_workflow_name")]
    pub name: String,

    /// Maximum number of commands executing at once. Defaults to the
    /// available parallelism of the machine.
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// Buffer size of every port connection.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Directory commands run in; relative to the config file's directory.
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Skip task instances whose outputs all exist already.
    #[serde(default)]
    pub skip_existing: bool,
}

fn default_workflow_name() -> String {
    "workflow".to_string()
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            name: default_workflow_name(),
            max_concurrent: None,
            channel_capacity: default_channel_capacity(),
            workdir: None,
            skip_existing: false,
        }
    }
}

impl WorkflowSection {
    pub fn effective_max_concurrent(&self) -> usize {
        self.max_concurrent.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// `[process.<name>]` section. Exactly one of `cmd`, `glob` and `combine`
/// must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    /// Command template; ports are derived from its placeholders.
    #[serde(default)]
    pub cmd: Option<String>,

    /// File glob; the process has a single output port `out`.
    #[serde(default)]
    pub glob: Option<String>,

    /// Combinator stream names, outermost first.
    #[serde(default)]
    pub combine: Option<Vec<String>>,

    /// Input port -> upstream `"process.port"`.
    #[serde(default, rename = "in")]
    pub inputs: BTreeMap<String, String>,

    /// Output port -> path template (command processes only).
    #[serde(default)]
    pub out: BTreeMap<String, String>,
}

/// Which kind a `[process.<name>]` section declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessConfigKind {
    Command,
    Globber,
    Combinator,
}

impl ProcessConfig {
    /// `None` unless exactly one of `cmd`/`glob`/`combine` is set.
    pub fn kind(&self) -> Option<ProcessConfigKind> {
        match (&self.cmd, &self.glob, &self.combine) {
            (Some(_), None, None) => Some(ProcessConfigKind::Command),
            (None, Some(_), None) => Some(ProcessConfigKind::Globber),
            (None, None, Some(_)) => Some(ProcessConfigKind::Combinator),
            _ => None,
        }
    }
}
