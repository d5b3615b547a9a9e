// tests/config_loading.rs

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use fileflow::config::{
    ConfigFile, build_workflow, default_config_path, load_and_validate, load_from_str,
    validate_config,
};
use fileflow::errors::FlowError;
use fileflow::flow::ProcessKind;

const COMBINE: &str = r#"
[workflow]
name = "combine"
max_concurrent = 3

[process.letters]
glob = "data/letterfile_*.txt"

[process.numbers]
glob = "data/numberfile_*.txt"

[process.combiner]
combine = ["letters", "numbers"]
in = { letters = "letters.out", numbers = "numbers.out" }

[process.cat]
cmd = "cat {i:letters} {i:numbers} > {o:combined}"
in = { letters = "combiner.letters", numbers = "combiner.numbers" }
out = { combined = "out/{i:letters|basename|%.txt}.{i:numbers|basename|%.txt}.combined.txt" }
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

fn validate(contents: &str) -> Result<ConfigFile, FlowError> {
    ConfigFile::try_from(load_from_str(contents)?)
}

fn config_error(result: Result<impl std::fmt::Debug, FlowError>) -> String {
    match result {
        Err(FlowError::ConfigError(msg)) => msg,
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn loads_and_builds_the_combine_workflow() {
    let file = write_config(COMBINE);
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.workflow.name, "combine");
    assert_eq!(cfg.workflow.max_concurrent, Some(3));
    assert_eq!(cfg.workflow.channel_capacity, 16);
    assert!(!cfg.workflow.skip_existing);

    let wf = build_workflow(&cfg, Path::new("/project")).unwrap();
    assert_eq!(wf.name(), "combine");
    assert_eq!(wf.max_concurrent(), 3);
    assert_eq!(wf.workdir(), Some(Path::new("/project")));

    let plan = wf.validate().unwrap();
    let order: Vec<&str> = plan
        .order
        .iter()
        .map(|id| wf.process(*id).unwrap().name.as_str())
        .collect();
    let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();
    assert!(pos("letters") < pos("combiner"));
    assert!(pos("numbers") < pos("combiner"));
    assert!(pos("combiner") < pos("cat"));

    let cat = wf.process(wf.process_id("cat").unwrap()).unwrap();
    assert!(matches!(cat.kind, ProcessKind::Command(_)));
    assert_eq!(cat.in_ports, vec!["letters", "numbers"]);
    assert_eq!(cat.out_ports.len(), 1);
    assert!(cat.out_ports[0].path.is_some());

    let combiner = wf.process(wf.process_id("combiner").unwrap()).unwrap();
    assert_eq!(combiner.in_ports, vec!["letters", "numbers"]);

    // A validated config stays valid.
    validate_config(&cfg).unwrap();
}

#[test]
fn default_config_lives_in_the_working_directory() {
    assert_eq!(default_config_path(), PathBuf::from("Fileflow.toml"));
}

#[test]
fn relative_workdir_is_joined_to_the_config_root() {
    let text = format!("{}\n", COMBINE.replace(
        "max_concurrent = 3",
        "max_concurrent = 3\nworkdir = \"runs\"\nskip_existing = true",
    ));
    let cfg = validate(&text).unwrap();
    let wf = build_workflow(&cfg, Path::new("/project")).unwrap();

    assert_eq!(wf.workdir(), Some(Path::new("/project/runs")));
    assert!(wf.skip_existing());
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/Fileflow.toml").unwrap_err();
    assert!(matches!(err, FlowError::IoError(_)), "got {err:?}");
}

#[test]
fn invalid_toml_and_unknown_keys_are_rejected() {
    let err = validate("[process.a\ncmd = 1").unwrap_err();
    assert!(matches!(err, FlowError::TomlError(_)), "got {err:?}");

    let err = validate("[process.a]\ncmd = \"true\"\nretries = 3\n").unwrap_err();
    assert!(matches!(err, FlowError::TomlError(_)), "got {err:?}");
}

#[test]
fn empty_config_is_rejected() {
    let msg = config_error(validate("[workflow]\nname = \"empty\"\n"));
    assert!(msg.contains("at least one"), "{msg}");
}

#[test]
fn cycles_are_rejected() {
    let msg = config_error(validate(
        r#"
[process.a]
cmd = "cat {i:in} > {o:out}"
in = { in = "b.out" }
out = { out = "a.txt" }

[process.b]
cmd = "cat {i:in} > {o:out}"
in = { in = "a.out" }
out = { out = "b.txt" }
"#,
    ));
    assert!(msg.contains("cycle"), "{msg}");
}

#[test]
fn unknown_and_self_references_are_rejected() {
    let msg = config_error(validate(
        r#"
[process.a]
cmd = "cat {i:in} > {o:out}"
in = { in = "ghost.out" }
out = { out = "a.txt" }
"#,
    ));
    assert!(msg.contains("unknown process 'ghost'"), "{msg}");

    let msg = config_error(validate(
        r#"
[process.a]
cmd = "cat {i:in} > {o:out}"
in = { in = "a.out" }
out = { out = "a.txt" }
"#,
    ));
    assert!(msg.contains("its own output"), "{msg}");
}

#[test]
fn process_kind_must_be_unique() {
    let msg = config_error(validate(
        "[process.a]\ncmd = \"true\"\nglob = \"*.txt\"\n",
    ));
    assert!(msg.contains("exactly one"), "{msg}");

    let msg = config_error(validate("[process.a]\n"));
    assert!(msg.contains("exactly one"), "{msg}");
}

#[test]
fn kind_specific_keys_are_checked() {
    let msg = config_error(validate(
        "[process.g]\nglob = \"*.txt\"\nout = { out = \"x\" }\n",
    ));
    assert!(msg.contains("only allowed on `cmd`"), "{msg}");

    let msg = config_error(validate(
        r#"
[process.g]
glob = "*.txt"

[process.h]
glob = "*.csv"
in = { x = "g.out" }
"#,
    ));
    assert!(msg.contains("no inputs"), "{msg}");

    let msg = config_error(validate("[process.c]\ncombine = []\n"));
    assert!(msg.contains("at least one stream"), "{msg}");
}

#[test]
fn zero_limits_are_rejected() {
    let msg = config_error(validate(
        "[workflow]\nmax_concurrent = 0\n\n[process.a]\ncmd = \"true\"\n",
    ));
    assert!(msg.contains("max_concurrent"), "{msg}");

    let msg = config_error(validate(
        "[workflow]\nchannel_capacity = 0\n\n[process.a]\ncmd = \"true\"\n",
    ));
    assert!(msg.contains("channel_capacity"), "{msg}");
}

#[test]
fn port_errors_surface_when_building() {
    // Input port the command never declares.
    let cfg = validate(
        r#"
[process.g]
glob = "*.txt"

[process.a]
cmd = "cat {i:in} > {o:out}"
in = { other = "g.out" }
out = { out = "a.txt" }
"#,
    )
    .unwrap();
    let msg = config_error(build_workflow(&cfg, Path::new("/")));
    assert!(msg.contains("no input port 'other'"), "{msg}");

    // Upstream output port that does not exist.
    let cfg = validate(
        r#"
[process.g]
glob = "*.txt"

[process.a]
cmd = "cat {i:in} > {o:out}"
in = { in = "g.files" }
out = { out = "a.txt" }
"#,
    )
    .unwrap();
    let msg = config_error(build_workflow(&cfg, Path::new("/")));
    assert!(msg.contains("no output port 'files'"), "{msg}");
}

#[test]
fn output_templates_are_checked_when_building() {
    let missing = validate(
        r#"
[process.g]
glob = "*.txt"

[process.a]
cmd = "cat {i:in} > {o:out}"
in = { in = "g.out" }
"#,
    )
    .unwrap();
    let msg = config_error(build_workflow(&missing, Path::new("/")));
    assert!(msg.contains("needs a path template"), "{msg}");

    let forward_ref = validate(
        r#"
[process.g]
glob = "*.txt"

[process.a]
cmd = "sort {i:in} > {o:sorted}; uniq {f:sorted} > {o:unique}"
in = { in = "g.out" }
out = { sorted = "{f:unique}.sorted", unique = "{i:in}.unique" }
"#,
    )
    .unwrap();
    let msg = config_error(build_workflow(&forward_ref, Path::new("/")));
    assert!(msg.contains("not available when naming outputs"), "{msg}");

    let backward_ref = validate(
        r#"
[process.g]
glob = "*.txt"

[process.a]
cmd = "sort {i:in} > {o:sorted}; uniq {f:sorted} > {o:unique}"
in = { in = "g.out" }
out = { sorted = "{i:in}.sorted", unique = "{f:sorted}.unique" }
"#,
    )
    .unwrap();
    build_workflow(&backward_ref, Path::new("/")).unwrap();
}

#[test]
fn malformed_command_template_is_a_config_error() {
    let cfg = validate("[process.a]\ncmd = \"cat {i:in > out\"\n").unwrap();
    let msg = config_error(build_workflow(&cfg, Path::new("/")));
    assert!(msg.contains("process 'a'"), "{msg}");
}
