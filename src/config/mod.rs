// src/config/mod.rs

//! Configuration loading and validation for fileflow.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like graph acyclicity (`validate.rs`).
//! - Build a runnable `Workflow` from a validated config (`build.rs`).

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::build_workflow;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, ProcessConfig, ProcessConfigKind, RawConfigFile, WorkflowSection};
pub use validate::validate_config;
