// src/engine/context.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::exec::CommandBackend;
use crate::fs::FileSystem;
use crate::port::{InPort, OutPort};
use crate::types::ProcessName;

/// Resources shared by every process of one run.
#[derive(Debug)]
pub struct RunEnv {
    /// Absolute directory commands run in.
    pub workdir: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub backend: Arc<dyn CommandBackend>,
    /// One permit per concurrently executing command.
    pub permits: Arc<Semaphore>,
    pub max_concurrent: usize,
    pub skip_existing: bool,
}

impl RunEnv {
    /// Resolve `path` against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }
}

/// Everything one process owns while it runs: its port halves, the run's
/// cancellation token and the shared environment.
#[derive(Debug)]
pub struct ProcessContext {
    pub name: ProcessName,
    /// In declaration order.
    pub inputs: Vec<InPort>,
    /// In declaration order.
    pub outputs: Vec<OutPort>,
    pub cancel: CancellationToken,
    pub env: Arc<RunEnv>,
}
