// src/exec/mod.rs

//! Command execution layer.
//!
//! - [`backend`] provides the `CommandBackend` trait and the production
//!   [`ShellBackend`], which tests can replace with a fake implementation.
//! - [`task_instance`] runs one bound invocation: resolves output paths and
//!   the command, executes it, promotes pending outputs and writes audits.
//! - [`command_process`] drives a command process: forms bindings from its
//!   inputs and emits instance outputs in binding order.

pub mod backend;
pub mod command_process;
pub mod task_instance;

pub use backend::{CommandBackend, CommandOutcome, CommandRequest, ShellBackend};
pub use command_process::run_command_process;
pub use task_instance::{PENDING_SUFFIX, pending_path};
