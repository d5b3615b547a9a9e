// src/engine/report.rs

use std::fmt;
use std::time::Duration;

/// What one process did during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub process: String,
    pub kind: &'static str,
    /// Tokens (tuples, for combinators) written to the output ports.
    pub emitted: usize,
    /// Task instances whose command actually ran.
    pub executed: usize,
    /// Task instances skipped because their outputs already existed.
    pub skipped: usize,
}

impl ProcessReport {
    pub fn new(process: impl Into<String>, kind: &'static str) -> Self {
        Self {
            process: process.into(),
            kind,
            emitted: 0,
            executed: 0,
            skipped: 0,
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub workflow: String,
    /// In topological order.
    pub processes: Vec<ProcessReport>,
    pub duration: Duration,
}

impl RunReport {
    pub fn process(&self, name: &str) -> Option<&ProcessReport> {
        self.processes.iter().find(|p| p.process == name)
    }

    /// Commands executed across all processes.
    pub fn tasks_executed(&self) -> usize {
        self.processes.iter().map(|p| p.executed).sum()
    }

    pub fn tasks_skipped(&self) -> usize {
        self.processes.iter().map(|p| p.skipped).sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "workflow '{}' finished in {:.2?}: {} executed, {} skipped",
            self.workflow,
            self.duration,
            self.tasks_executed(),
            self.tasks_skipped()
        )?;
        for p in &self.processes {
            writeln!(
                f,
                "  {:<20} {:<10} emitted={} executed={} skipped={}",
                p.process, p.kind, p.emitted, p.executed, p.skipped
            )?;
        }
        Ok(())
    }
}
