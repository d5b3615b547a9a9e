// src/flow/mod.rs

//! Build-time description of a workflow.
//!
//! - [`process`] holds the static description of each process: its kind
//!   and its declared input/output ports.
//! - [`workflow`] is the owning context: it registers processes, hands out
//!   typed port handles, records connections and output path templates.
//! - [`validate`] checks the finished graph before a run (every input
//!   connected, every output named, no cycles) and yields a topological
//!   order.
//!
//! Nothing in here touches channels or processes; see [`crate::engine`] for
//! the runtime.

pub mod process;
pub mod validate;
pub mod workflow;

pub use process::{OutPortSpec, ProcessKind, ProcessSpec};
pub use validate::{ExecutionPlan, validate_workflow};
pub use workflow::Workflow;
