// src/components/mod.rs

//! Built-in processes that do not run a shell command.
//!
//! - [`globber`]: turns a file glob into a stream of path tokens.
//! - [`combinator`]: buffers several streams and emits their Cartesian
//!   product.

pub mod combinator;
pub mod globber;

pub use combinator::{CartesianIndices, cartesian_indices, run_combinator};
pub use globber::{GLOBBER_OUT_PORT, GlobPattern, run_globber};
