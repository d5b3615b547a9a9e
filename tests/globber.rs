// tests/globber.rs

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use fileflow::components::{GlobPattern, run_globber};
use fileflow::fs::MockFileSystem;
use fileflow::port::OutPort;
use fileflow_test_utils::{init_tracing, with_timeout};

fn fixture() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/data/letterfile_b.txt", "b\n");
    fs.add_file("/data/letterfile_a.txt", "a\n");
    fs.add_file("/data/numberfile_1.txt", "1\n");
    fs.add_file("/data/notes.md", "ignore me\n");
    fs.add_file("/data/nested/letterfile_c.txt", "c\n");
    fs.add_file("/data/nested/deeper/letterfile_d.txt", "d\n");
    fs
}

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

#[test]
fn matches_are_sorted_and_filtered() {
    let fs = fixture();
    let pattern = GlobPattern::new("/data/letterfile_*.txt").unwrap();

    assert_eq!(pattern.base(), Path::new("/data"));
    assert_eq!(
        pattern.find_matches(Path::new("/"), &fs).unwrap(),
        paths(&["/data/letterfile_a.txt", "/data/letterfile_b.txt"])
    );
}

#[test]
fn single_star_does_not_descend() {
    let fs = fixture();
    let pattern = GlobPattern::new("/data/*.txt").unwrap();

    let found = pattern.find_matches(Path::new("/"), &fs).unwrap();
    assert_eq!(
        found,
        paths(&[
            "/data/letterfile_a.txt",
            "/data/letterfile_b.txt",
            "/data/numberfile_1.txt",
        ])
    );
}

#[test]
fn double_star_descends_any_depth() {
    let fs = fixture();
    let pattern = GlobPattern::new("/data/**/letterfile_*.txt").unwrap();

    let found = pattern.find_matches(Path::new("/"), &fs).unwrap();
    assert_eq!(
        found,
        paths(&[
            "/data/letterfile_a.txt",
            "/data/letterfile_b.txt",
            "/data/nested/deeper/letterfile_d.txt",
            "/data/nested/letterfile_c.txt",
        ])
    );
}

#[test]
fn wildcard_directory_component_matches_one_level() {
    let fs = fixture();
    let pattern = GlobPattern::new("/data/*/letterfile_*.txt").unwrap();

    let found = pattern.find_matches(Path::new("/"), &fs).unwrap();
    assert_eq!(found, paths(&["/data/nested/letterfile_c.txt"]));
}

#[test]
fn relative_patterns_resolve_against_the_workdir() {
    let fs = MockFileSystem::new();
    fs.add_file("/work/inputs/x.txt", "x");
    fs.add_file("/work/inputs/y.txt", "y");

    let pattern = GlobPattern::new("inputs/*.txt").unwrap();
    let found = pattern.find_matches(Path::new("/work"), &fs).unwrap();
    assert_eq!(found, paths(&["/work/inputs/x.txt", "/work/inputs/y.txt"]));
}

#[test]
fn literal_pattern_matches_a_single_file() {
    let fs = fixture();
    let pattern = GlobPattern::new("/data/notes.md").unwrap();

    let found = pattern.find_matches(Path::new("/"), &fs).unwrap();
    assert_eq!(found, paths(&["/data/notes.md"]));
}

#[test]
fn missing_base_directory_matches_nothing() {
    let fs = fixture();
    let pattern = GlobPattern::new("/nowhere/*.txt").unwrap();
    assert!(pattern.find_matches(Path::new("/"), &fs).unwrap().is_empty());
}

#[test]
fn malformed_patterns_are_rejected() {
    for bad in ["", "   ", "/data/", "/data/letterfile_[.txt"] {
        assert!(GlobPattern::new(bad).is_err(), "{bad:?} should be rejected");
    }
}

#[tokio::test]
async fn run_globber_emits_one_token_per_match_then_closes() {
    init_tracing();
    let fs = fixture();
    let cancel = CancellationToken::new();
    let pattern = GlobPattern::new("/data/letterfile_*.txt").unwrap();

    let mut out = OutPort::new("out");
    let mut downstream = out.connect("in", 8);

    let emitted = with_timeout(run_globber(
        "letters",
        &pattern,
        Path::new("/"),
        &fs,
        &mut out,
        &cancel,
    ))
    .await
    .unwrap();
    assert_eq!(emitted, 2);
    drop(out);

    let mut seen = Vec::new();
    while let Some(token) = downstream.recv(&cancel).await.unwrap() {
        let origin = token.origin().unwrap();
        assert_eq!(origin.process, "letters");
        assert_eq!(origin.port, "out");
        seen.push(token.path().to_path_buf());
    }
    assert_eq!(
        seen,
        paths(&["/data/letterfile_a.txt", "/data/letterfile_b.txt"])
    );
}

#[tokio::test]
async fn run_globber_with_no_matches_emits_nothing() {
    let fs = fixture();
    let cancel = CancellationToken::new();
    let pattern = GlobPattern::new("/data/*.csv").unwrap();

    let mut out = OutPort::new("out");
    let mut downstream = out.connect("in", 8);

    let emitted = run_globber("csv", &pattern, Path::new("/"), &fs, &mut out, &cancel)
        .await
        .unwrap();
    assert_eq!(emitted, 0);
    drop(out);

    assert!(downstream.recv(&cancel).await.unwrap().is_none());
}
