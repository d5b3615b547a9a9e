// tests/concurrency_limit.rs

use std::sync::Arc;
use std::time::Duration;

use fileflow::fs::MockFileSystem;
use fileflow_test_utils::{CombineWorkflowBuilder, RecordingBackend, init_tracing, with_timeout};

/// Four letters by three numbers: twelve instances of `cat`.
fn twelve_task_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    for letter in ["a", "b", "c", "d"] {
        fs.add_file(format!("/data/letterfile_{letter}.txt"), format!("{letter}\n"));
    }
    for number in ["1", "2", "3"] {
        fs.add_file(format!("/data/numberfile_{number}.txt"), format!("{number}\n"));
    }
    fs
}

async fn peak_for(max_concurrent: usize) -> usize {
    let fs = twelve_task_fs();
    let backend =
        RecordingBackend::new(Arc::new(fs.clone())).with_delay(Duration::from_millis(20));

    let wf = CombineWorkflowBuilder::new("/data", "/out")
        .max_concurrent(max_concurrent)
        .build()
        .unwrap()
        .with_workdir("/work")
        .with_filesystem(Arc::new(fs.clone()))
        .with_backend(Arc::new(backend.clone()));

    let report = with_timeout(wf.run()).await.unwrap();
    assert_eq!(report.tasks_executed(), 12);
    assert_eq!(backend.executed().len(), 12);
    backend.peak_concurrency()
}

#[tokio::test]
async fn running_commands_never_exceed_max_concurrent() {
    init_tracing();
    assert_eq!(peak_for(3).await, 3);
}

#[tokio::test]
async fn single_slot_runs_commands_one_at_a_time() {
    init_tracing();
    assert_eq!(peak_for(1).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn limit_holds_on_a_multi_threaded_runtime() {
    init_tracing();
    let peak = peak_for(2).await;
    assert!(peak <= 2, "peak {peak} exceeds the limit of 2");
    assert!(peak >= 1);
}
