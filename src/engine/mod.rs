// src/engine/mod.rs

//! Execution engine.
//!
//! A run wires fresh bounded channels for every connection, then starts
//! each process as an independent tokio task:
//!
//! - [`context`] holds what a running process owns ([`ProcessContext`]) and
//!   the resources shared across the run ([`RunEnv`]).
//! - [`runtime`] spawns the processes, propagates the first failure by
//!   cancelling the shared token, and assembles the [`RunReport`].
//! - [`report`] defines the per-run and per-process summaries.

pub mod context;
pub mod report;
pub mod runtime;

pub use context::{ProcessContext, RunEnv};
pub use report::{ProcessReport, RunReport};
