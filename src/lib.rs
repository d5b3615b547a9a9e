// src/lib.rs

pub mod audit;
pub mod cli;
pub mod components;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod flow;
pub mod fs;
pub mod logging;
pub mod port;
pub mod template;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{build_workflow, load_and_validate};
use crate::flow::{ProcessKind, Workflow};
use crate::types::InPortId;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - building the workflow graph
/// - running it (or printing it for `--dry-run`)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading workflow from {:?}", config_path))?;

    let root = config_root_dir(&config_path);
    let mut wf = build_workflow(&cfg, &root)?;

    if let Some(n) = args.max_concurrent {
        wf.set_max_concurrent(n as usize);
    }
    if args.skip_existing {
        wf = wf.with_skip_existing(true);
    }

    if args.dry_run {
        print_dry_run(&wf)?;
        return Ok(());
    }

    info!(workflow = %wf.name(), "starting workflow");

    // Dropping the run on Ctrl-C aborts every process task; running
    // commands are killed with them.
    let report = tokio::select! {
        result = wf.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl+C")?;
            bail!("interrupted");
        }
    };

    print!("{report}");
    Ok(())
}

/// Directory a relative `[workflow].workdir` is resolved against.
///
/// - If the config path has a non-empty parent (e.g. "flows/Fileflow.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Fileflow.toml" (parent = ""),
///   we fall back to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: processes in execution order with their
/// commands, paths and connections.
fn print_dry_run(wf: &Workflow) -> Result<()> {
    let plan = wf.validate()?;

    println!("fileflow dry-run");
    println!("  workflow = {:?}", wf.name());
    println!("  max_concurrent = {}", wf.max_concurrent());
    println!("  channel_capacity = {}", wf.channel_capacity());
    if let Some(dir) = wf.workdir() {
        println!("  workdir = {:?}", dir);
    }
    if wf.skip_existing() {
        println!("  skip_existing = true");
    }
    println!();

    println!("processes ({}):", plan.order.len());
    for id in plan.order {
        let Some(spec) = wf.process(id) else {
            continue;
        };
        println!("  - {} ({})", spec.name, spec.kind.label());

        match &spec.kind {
            ProcessKind::Command(template) => println!("      cmd: {template}"),
            ProcessKind::Globber(pattern) => println!("      glob: {pattern}"),
            ProcessKind::Combinator => println!("      streams: {:?}", spec.in_ports),
        }

        for (index, port) in spec.in_ports.iter().enumerate() {
            let input = InPortId { process: id, index };
            if let Some(output) = wf.upstream_of(input) {
                println!("      in  {port} <- {}", wf.out_port_label(output)?);
            }
        }
        for out in &spec.out_ports {
            match &out.path {
                Some(path) => println!("      out {} -> {path}", out.name),
                None => println!("      out {}", out.name),
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
