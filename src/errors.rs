// src/errors.rs

//! Crate-wide error type.
//!
//! `FlowError` follows the engine's failure taxonomy:
//!
//! - [`FlowError::ConfigError`] is raised while building a workflow, before
//!   anything runs.
//! - [`FlowError::BindingError`], [`FlowError::ExecutionError`] and
//!   [`FlowError::FilesystemError`] are scoped to a single task instance but
//!   fail the whole run.
//! - [`FlowError::Cancelled`] marks units that stopped because some other
//!   unit already failed the run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Binding error in process '{process}': {message}")]
    BindingError { process: String, message: String },

    #[error(
        "Execution error in process '{process}': command `{command}` {}",
        describe_exit(.exit_code)
    )]
    ExecutionError {
        process: String,
        command: String,
        /// `None` when the command could not be launched or was killed by a signal.
        exit_code: Option<i32>,
        /// Captured stdout + stderr of the command (may be empty).
        output: String,
    },

    #[error("Filesystem error in process '{process}' at {path:?}: {message}")]
    FilesystemError {
        process: String,
        path: PathBuf,
        message: String,
    },

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlowError {
    pub fn config(message: impl Into<String>) -> Self {
        FlowError::ConfigError(message.into())
    }

    pub fn binding(process: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::BindingError {
            process: process.into(),
            message: message.into(),
        }
    }

    pub fn filesystem(
        process: impl Into<String>,
        path: impl Into<PathBuf>,
        err: impl std::fmt::Display,
    ) -> Self {
        FlowError::FilesystemError {
            process: process.into(),
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FlowError::Cancelled)
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "failed to launch or was terminated by a signal".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowError>;
