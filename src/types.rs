// src/types.rs

use std::fmt;
use std::str::FromStr;

/// Canonical process name type used throughout the engine.
pub type ProcessName = String;

/// Typed handle to a process registered in a [`crate::flow::Workflow`].
///
/// Handles are only meaningful for the workflow that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub(crate) usize);

impl ProcessId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Typed handle to an input port: owning process plus the port's position
/// in that process's input declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InPortId {
    pub(crate) process: ProcessId,
    pub(crate) index: usize,
}

impl InPortId {
    pub fn process(self) -> ProcessId {
        self.process
    }
}

/// Typed handle to an output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPortId {
    pub(crate) process: ProcessId,
    pub(crate) index: usize,
}

impl OutPortId {
    pub fn process(self) -> ProcessId {
        self.process
    }
}

/// A `process.port` reference as written in config files, e.g.
/// `"combiner.letters"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRef {
    pub process: ProcessName,
    pub port: String,
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.process, self.port)
    }
}

impl FromStr for PortRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Process names may contain dots; the port name is everything after
        // the last one.
        match s.trim().rsplit_once('.') {
            Some((process, port)) if !process.is_empty() && !port.is_empty() => Ok(PortRef {
                process: process.to_string(),
                port: port.to_string(),
            }),
            _ => Err(format!(
                "invalid port reference: {s} (expected \"<process>.<port>\")"
            )),
        }
    }
}
