// src/port/token.rs

use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::PortRef;

/// Immutable unit of data flowing through a port: a file path plus the
/// port that produced it, when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    path: PathBuf,
    origin: Option<PortRef>,
}

impl Token {
    /// A token with no provenance, e.g. one injected by a test.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: None,
        }
    }

    /// A token tagged with the process and port that emitted it.
    pub fn produced_by(
        path: impl Into<PathBuf>,
        process: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            origin: Some(PortRef {
                process: process.into(),
                port: port.into(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path rendered for templates and audit records.
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn origin(&self) -> Option<&PortRef> {
        self.origin.as_ref()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
