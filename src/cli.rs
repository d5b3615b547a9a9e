// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `fileflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fileflow",
    version,
    about = "Run file-based dataflow workflows: globs, combinators and shell commands wired by ports.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow file (TOML).
    ///
    /// Default: `Fileflow.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Fileflow.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FILEFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Override `[workflow].max_concurrent`.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_concurrent: Option<u32>,

    /// Do not re-run task instances whose outputs already exist.
    #[arg(long)]
    pub skip_existing: bool,

    /// Parse + validate, print the process graph, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
