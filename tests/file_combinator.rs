// tests/file_combinator.rs
//
// End-to-end runs of the letters x numbers graph through a real shell.
#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use fileflow::audit::{AUDIT_SUFFIX, AuditRecord};
use fileflow::exec::PENDING_SUFFIX;
use fileflow_test_utils::{
    CombineWorkflowBuilder, init_tracing, with_timeout, write_letters_and_numbers,
};

type TestResult = Result<(), Box<dyn Error>>;

const EXPECTED: [(&str, &str, &str); 6] = [
    ("a", "1", "a\n1\n"),
    ("a", "2", "a\n2\n"),
    ("a", "3", "a\n3\n"),
    ("b", "1", "b\n1\n"),
    ("b", "2", "b\n2\n"),
    ("b", "3", "b\n3\n"),
];

fn combined_path(out: &Path, letter: &str, number: &str) -> PathBuf {
    out.join(format!("letterfile_{letter}.numberfile_{number}.combined.txt"))
}

fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().ends_with(suffix))
        .collect();
    found.sort();
    found
}

#[tokio::test]
async fn combines_every_letter_with_every_number() -> TestResult {
    init_tracing();
    let tmp = tempdir()?;
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    write_letters_and_numbers(&data);

    let wf = CombineWorkflowBuilder::new(&data, &out)
        .build()?
        .with_workdir(tmp.path());
    let report = with_timeout(wf.run()).await?;

    assert_eq!(report.tasks_executed(), 6);
    assert_eq!(report.process("letters").unwrap().emitted, 2);
    assert_eq!(report.process("numbers").unwrap().emitted, 3);
    assert_eq!(report.process("combiner").unwrap().emitted, 6);
    assert_eq!(report.process("cat").unwrap().executed, 6);

    assert_eq!(files_with_suffix(&out, ".combined.txt").len(), 6);
    for (letter, number, contents) in EXPECTED {
        let path = combined_path(&out, letter, number);
        assert_eq!(fs::read_to_string(&path)?, contents, "{path:?}");
    }

    assert!(files_with_suffix(&out, PENDING_SUFFIX).is_empty());
    Ok(())
}

#[tokio::test]
async fn every_output_gets_an_audit_sidecar() -> TestResult {
    init_tracing();
    let tmp = tempdir()?;
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    write_letters_and_numbers(&data);

    let wf = CombineWorkflowBuilder::new(&data, &out)
        .max_concurrent(2)
        .build()?
        .with_workdir(tmp.path());
    with_timeout(wf.run()).await?;

    assert_eq!(files_with_suffix(&out, AUDIT_SUFFIX).len(), 6);

    let output = combined_path(&out, "b", "2");
    let sidecar = PathBuf::from(format!("{}{AUDIT_SUFFIX}", output.display()));
    let record: AuditRecord = serde_json::from_str(&fs::read_to_string(&sidecar)?)?;

    assert_eq!(record.process, "cat");
    assert_eq!(record.exit_code, Some(0));
    assert_eq!(record.output.port, "combined");
    assert_eq!(record.output.path, output.to_string_lossy());
    assert_eq!(
        record.output.blake3,
        blake3::hash(&fs::read(&output)?).to_hex().to_string()
    );
    assert!(record.finished_at >= record.started_at);
    assert!(record.command.starts_with("cat "));
    assert!(record.command.contains(PENDING_SUFFIX));

    let ports: Vec<&str> = record.inputs.iter().map(|i| i.port.as_str()).collect();
    assert_eq!(ports, vec!["letters", "numbers"]);
    assert!(record.inputs[0].path.ends_with("letterfile_b.txt"));
    assert!(record.inputs[1].path.ends_with("numberfile_2.txt"));
    assert_eq!(record.inputs[0].producer.as_deref(), Some("letters.out"));
    assert_eq!(record.inputs[1].producer.as_deref(), Some("numbers.out"));

    // Glob inputs have no sidecars of their own.
    assert!(record.upstream.is_empty());
    Ok(())
}

#[tokio::test]
async fn rerun_reproduces_identical_outputs() -> TestResult {
    init_tracing();
    let tmp = tempdir()?;
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    write_letters_and_numbers(&data);

    let wf = CombineWorkflowBuilder::new(&data, &out)
        .build()?
        .with_workdir(tmp.path());
    with_timeout(wf.run()).await?;

    let first: Vec<Vec<u8>> = files_with_suffix(&out, ".combined.txt")
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();

    fs::remove_dir_all(&out)?;
    let report = with_timeout(wf.run()).await?;
    assert_eq!(report.tasks_executed(), 6);

    let second: Vec<Vec<u8>> = files_with_suffix(&out, ".combined.txt")
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();
    assert_eq!(first, second);
    assert_eq!(files_with_suffix(&out, AUDIT_SUFFIX).len(), 6);
    Ok(())
}

#[tokio::test]
async fn skip_existing_only_reruns_missing_outputs() -> TestResult {
    init_tracing();
    let tmp = tempdir()?;
    let data = tmp.path().join("data");
    let out = tmp.path().join("out");
    write_letters_and_numbers(&data);

    let wf = CombineWorkflowBuilder::new(&data, &out)
        .build()?
        .with_workdir(tmp.path())
        .with_skip_existing(true);

    let first = with_timeout(wf.run()).await?;
    assert_eq!(first.tasks_executed(), 6);
    assert_eq!(first.tasks_skipped(), 0);

    fs::remove_file(combined_path(&out, "a", "3"))?;
    let second = with_timeout(wf.run()).await?;
    assert_eq!(second.tasks_executed(), 1);
    assert_eq!(second.tasks_skipped(), 5);
    assert_eq!(fs::read_to_string(combined_path(&out, "a", "3"))?, "a\n3\n");
    Ok(())
}

#[tokio::test]
async fn relative_paths_resolve_against_the_workdir() -> TestResult {
    init_tracing();
    let tmp = tempdir()?;
    write_letters_and_numbers(&tmp.path().join("data"));

    let wf = CombineWorkflowBuilder::new("data", "results")
        .build()?
        .with_workdir(tmp.path());
    with_timeout(wf.run()).await?;

    let out = tmp.path().join("results");
    for (letter, number, contents) in EXPECTED {
        assert_eq!(fs::read_to_string(combined_path(&out, letter, number))?, contents);
    }
    Ok(())
}
