// src/audit/mod.rs

//! Audit sidecars.
//!
//! Every output file produced by a command gets a JSON sidecar describing
//! how it was made: which process and command, which inputs, when, and a
//! blake3 digest of the result. When an input has a sidecar of its own,
//! that record is embedded under `upstream`, so the sidecar of a final
//! output carries its full lineage.

pub mod hash;
pub mod record;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::fs::FileSystem;

pub use hash::compute_file_hash;
pub use record::{AuditInput, AuditOutput, AuditRecord};

/// Suffix appended to an output path to name its audit sidecar.
pub const AUDIT_SUFFIX: &str = ".audit.json";

/// Sidecar path for `output`.
pub fn audit_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(AUDIT_SUFFIX);
    PathBuf::from(name)
}

/// Serialize `record` as pretty JSON next to its output file.
pub fn write_audit(fs: &dyn FileSystem, record: &AuditRecord) -> Result<PathBuf> {
    let path = audit_path(Path::new(&record.output.path));
    let json = serde_json::to_vec_pretty(record).context("serializing audit record")?;
    fs.write(&path, &json)
        .with_context(|| format!("writing audit file {:?}", path))?;
    debug!(path = ?path, task = %record.task_id, "wrote audit record");
    Ok(path)
}

/// Read the audit sidecar of `file`, if it has one.
pub fn read_audit(fs: &dyn FileSystem, file: &Path) -> Result<Option<AuditRecord>> {
    let path = audit_path(file);
    if !fs.is_file(&path) {
        return Ok(None);
    }
    let text = fs.read_to_string(&path)?;
    let record = serde_json::from_str(&text)
        .with_context(|| format!("parsing audit file {:?}", path))?;
    Ok(Some(record))
}

/// Audit records of every input that has one, keyed by input path.
///
/// A sidecar that cannot be parsed is skipped with a warning; it only
/// affects lineage, never the run.
pub fn collect_upstream(fs: &dyn FileSystem, inputs: &[AuditInput]) -> BTreeMap<String, AuditRecord> {
    let mut upstream = BTreeMap::new();
    for input in inputs {
        match read_audit(fs, Path::new(&input.path)) {
            Ok(Some(record)) => {
                upstream.insert(input.path.clone(), record);
            }
            Ok(None) => {}
            Err(e) => warn!(input = %input.path, error = %format!("{e:#}"), "ignoring unreadable upstream audit"),
        }
    }
    upstream
}
