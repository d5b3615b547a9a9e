// src/flow/process.rs

use crate::components::GlobPattern;
use crate::template::Template;
use crate::types::ProcessName;

/// How a process turns its inputs into outputs.
#[derive(Debug, Clone)]
pub enum ProcessKind {
    /// Run a templated shell command once per bound set of input tokens.
    Command(Template),
    /// Emit one token per file matching a glob, then close.
    Globber(GlobPattern),
    /// Drain every registered stream, then emit their Cartesian product.
    Combinator,
}

impl ProcessKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessKind::Command(_) => "command",
            ProcessKind::Globber(_) => "globber",
            ProcessKind::Combinator => "combinator",
        }
    }
}

/// A declared output port and, for command processes, its path template.
#[derive(Debug, Clone)]
pub struct OutPortSpec {
    pub name: String,
    pub path: Option<Template>,
}

/// Static description of one process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub name: ProcessName,
    pub kind: ProcessKind,
    /// Input port names in declaration order.
    pub in_ports: Vec<String>,
    pub out_ports: Vec<OutPortSpec>,
}

impl ProcessSpec {
    /// A command process; its ports are whatever the command references.
    pub fn command(name: ProcessName, template: Template) -> Self {
        let in_ports = template.ports_where(|k| !k.is_output());
        let out_ports = template
            .ports_where(|k| k.is_output())
            .into_iter()
            .map(|name| OutPortSpec { name, path: None })
            .collect();

        Self {
            name,
            kind: ProcessKind::Command(template),
            in_ports,
            out_ports,
        }
    }

    pub fn globber(name: ProcessName, pattern: GlobPattern) -> Self {
        Self {
            name,
            kind: ProcessKind::Globber(pattern),
            in_ports: Vec::new(),
            out_ports: vec![OutPortSpec {
                name: crate::components::GLOBBER_OUT_PORT.to_string(),
                path: None,
            }],
        }
    }

    /// A combinator starts with no streams; see `Workflow::add_stream`.
    pub fn combinator(name: ProcessName) -> Self {
        Self {
            name,
            kind: ProcessKind::Combinator,
            in_ports: Vec::new(),
            out_ports: Vec::new(),
        }
    }

    pub fn in_index(&self, port: &str) -> Option<usize> {
        self.in_ports.iter().position(|p| p == port)
    }

    pub fn out_index(&self, port: &str) -> Option<usize> {
        self.out_ports.iter().position(|p| p.name == port)
    }

    pub fn command_template(&self) -> Option<&Template> {
        match &self.kind {
            ProcessKind::Command(t) => Some(t),
            _ => None,
        }
    }
}
