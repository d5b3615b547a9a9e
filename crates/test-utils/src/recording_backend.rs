use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;
use fileflow::errors::{FlowError, Result};
use fileflow::exec::{CommandBackend, CommandOutcome, CommandRequest};
use fileflow::fs::FileSystem;

/// A fake command backend that:
/// - records every command it was asked to run
/// - "produces" each pending output by writing the command text into it
/// - optionally fails commands containing a given substring
/// - tracks how many commands were running at the same time.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    fs: Arc<dyn FileSystem>,
    executed: Arc<Mutex<Vec<CommandRequest>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    fail_matching: Option<String>,
    delay: Option<Duration>,
}

/// Decrements the running count however `execute` returns.
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingBackend {
    /// Outputs are written through `fs`, normally the same filesystem the
    /// workflow uses.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            executed: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            fail_matching: None,
            delay: None,
        }
    }

    /// Exit with status 1 (and write nothing) for commands containing `needle`.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_matching = Some(needle.into());
        self
    }

    /// Pretend every command takes `delay` to run.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests in the order they started executing.
    pub fn executed(&self) -> Vec<CommandRequest> {
        self.executed.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.executed().into_iter().map(|r| r.command).collect()
    }

    /// Highest number of commands that were executing at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.executed.lock().unwrap().clear();
        self.peak.store(0, Ordering::SeqCst);
    }
}

impl CommandBackend for RecordingBackend {
    fn execute<'a>(
        &'a self,
        request: &'a CommandRequest,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome>> + Send + 'a>> {
        Box::pin(async move {
            self.executed.lock().unwrap().push(request.clone());
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _running = RunningGuard(Arc::clone(&self.running));

            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FlowError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if let Some(needle) = &self.fail_matching {
                if request.command.contains(needle.as_str()) {
                    return Ok(CommandOutcome::failed(1, format!("forced failure for {needle}")));
                }
            }

            for path in &request.pending_outputs {
                self.fs
                    .write(path, request.command.as_bytes())
                    .map_err(|e| FlowError::Other(anyhow!("fake write failed: {e:#}")))?;
            }

            Ok(CommandOutcome::success())
        })
    }
}

/// A backend whose commands can never be launched.
#[derive(Debug, Clone, Default)]
pub struct UnlaunchableBackend;

impl CommandBackend for UnlaunchableBackend {
    fn execute<'a>(
        &'a self,
        request: &'a CommandRequest,
        _cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome>> + Send + 'a>> {
        Box::pin(async move {
            Err(FlowError::Other(anyhow!(
                "cannot spawn shell for '{}'",
                request.process
            )))
        })
    }
}

/// A backend that panics instead of running anything.
#[derive(Debug, Clone, Default)]
pub struct PanickingBackend;

impl CommandBackend for PanickingBackend {
    fn execute<'a>(
        &'a self,
        request: &'a CommandRequest,
        _cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome>> + Send + 'a>> {
        Box::pin(async move { explode(&request.task_id) })
    }
}

fn explode(task_id: &str) -> Result<CommandOutcome> {
    panic!("backend exploded on {task_id}")
}
