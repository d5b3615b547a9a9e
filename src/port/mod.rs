// src/port/mod.rs

//! Ports and the tokens that flow through them.
//!
//! - [`token`] defines the immutable [`Token`] carried on every port.
//! - [`channel`] holds the runtime halves of a connection: an [`InPort`]
//!   owns the receiving end of one bounded channel, an [`OutPort`] owns the
//!   sending ends of every input connected to it and broadcasts to all of
//!   them.
//!
//! Build-time wiring is expressed with the typed handles in
//! [`crate::types`]; the runtime halves only exist while a workflow runs.

pub mod channel;
pub mod token;

pub use channel::{InPort, OutPort, send_tuple};
pub use token::Token;

/// Default bound on each port's buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;
