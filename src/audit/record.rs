// src/audit/record.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of one output file, stored next to it as
/// `<output>.audit.json`.
///
/// ```json
/// {
///   "process": "cat",
///   "task_id": "cat-0003",
///   "command": "cat /tmp/a.txt /tmp/1.txt > /tmp/a.1.combined.txt.fileflow.tmp",
///   "inputs": [{ "port": "letters", "path": "/tmp/a.txt", "producer": "letters.out" }],
///   "output": { "port": "combined", "path": "/tmp/a.1.combined.txt", "blake3": "…" },
///   "started_at": "2026-01-01T12:00:00Z",
///   "finished_at": "2026-01-01T12:00:00.015Z",
///   "duration_ms": 15,
///   "exit_code": 0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub process: String,
    pub task_id: String,
    pub command: String,
    /// Bound inputs in port declaration order.
    pub inputs: Vec<AuditInput>,
    pub output: AuditOutput,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    /// Audit records of inputs that had one, keyed by input path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub upstream: BTreeMap<String, AuditRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInput {
    pub port: String,
    pub path: String,
    /// `process.port` that emitted the token, when known.
    #[serde(default)]
    pub producer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOutput {
    pub port: String,
    pub path: String,
    /// Hex blake3 digest of the file contents.
    pub blake3: String,
}

impl AuditRecord {
    /// Depth of the upstream chain (0 when no input was audited).
    pub fn lineage_depth(&self) -> usize {
        self.upstream
            .values()
            .map(|r| r.lineage_depth() + 1)
            .max()
            .unwrap_or(0)
    }
}
