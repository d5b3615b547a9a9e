#![allow(dead_code)]

use std::path::{Path, PathBuf};

use fileflow::errors::Result;
use fileflow::flow::Workflow;

/// Write `name -> contents` pairs into `dir` as `<prefix><name>.txt`.
///
/// Returns the written paths in the given order.
pub fn write_inputs(dir: &Path, prefix: &str, items: &[(&str, &str)]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).expect("creating fixture dir");
    items
        .iter()
        .map(|(name, contents)| {
            let path = dir.join(format!("{prefix}{name}.txt"));
            std::fs::write(&path, contents).expect("writing fixture file");
            path
        })
        .collect()
}

/// Letter files `a`, `b` and number files `1`, `2`, `3`, each containing
/// its own name followed by a newline.
pub fn write_letters_and_numbers(dir: &Path) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let letters = write_inputs(dir, "letterfile_", &[("a", "a\n"), ("b", "b\n")]);
    let numbers = write_inputs(
        dir,
        "numberfile_",
        &[("1", "1\n"), ("2", "2\n"), ("3", "3\n")],
    );
    (letters, numbers)
}

/// The canonical file-combinator graph:
///
/// ```text
/// letters (glob) ─┐
///                 ├─ combiner ─ cat -> out/<letter>.<number>.combined.txt
/// numbers (glob) ─┘
/// ```
///
/// Input files are looked up in `data_dir`; outputs go to `out_dir`.
pub struct CombineWorkflowBuilder {
    name: String,
    data_dir: PathBuf,
    out_dir: PathBuf,
    max_concurrent: usize,
    command: String,
}

impl CombineWorkflowBuilder {
    pub fn new(data_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: "combine".to_string(),
            data_dir: data_dir.into(),
            out_dir: out_dir.into(),
            max_concurrent: 4,
            command: "cat {i:letters} {i:numbers} > {o:combined}".to_string(),
        }
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Replace the combining command; it must use `{i:letters}`,
    /// `{i:numbers}` and write `{o:combined}`.
    pub fn command(mut self, cmd: &str) -> Self {
        self.command = cmd.to_string();
        self
    }

    pub fn build(self) -> Result<Workflow> {
        let mut wf = Workflow::new(self.name, self.max_concurrent);

        let letters_glob = self.data_dir.join("letterfile_*.txt");
        let numbers_glob = self.data_dir.join("numberfile_*.txt");
        let letters = wf.add_globber("letters", &letters_glob.to_string_lossy())?;
        let numbers = wf.add_globber("numbers", &numbers_glob.to_string_lossy())?;

        let combiner = wf.add_combinator("combiner")?;
        let comb_letters = wf.add_stream(combiner, "letters")?;
        let comb_numbers = wf.add_stream(combiner, "numbers")?;
        wf.connect(comb_letters, wf.out_port(letters, "out")?)?;
        wf.connect(comb_numbers, wf.out_port(numbers, "out")?)?;

        let cat = wf.add_process("cat", &self.command)?;
        let out_template = format!(
            "{}/{{i:letters|basename|%.txt}}.{{i:numbers|basename|%.txt}}.combined.txt",
            self.out_dir.to_string_lossy()
        );
        wf.set_out_path(cat, "combined", &out_template)?;
        wf.connect(wf.in_port(cat, "letters")?, wf.out_port(combiner, "letters")?)?;
        wf.connect(wf.in_port(cat, "numbers")?, wf.out_port(combiner, "numbers")?)?;

        Ok(wf)
    }
}
