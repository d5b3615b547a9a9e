// src/components/globber.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result as AnyResult, bail};
use globset::{GlobBuilder, GlobMatcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{FlowError, Result};
use crate::fs::FileSystem;
use crate::port::{OutPort, Token};

/// Name of the single output port of every globber.
pub const GLOBBER_OUT_PORT: &str = "out";

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// A compiled file glob, split into a literal base directory and the
/// pattern matched below it.
///
/// `/tmp/data/letterfile_*.txt` walks `/tmp/data` and matches
/// `letterfile_*.txt` against paths relative to it. `*` never crosses a
/// `/`; use `**` to descend any number of directories.
#[derive(Clone)]
pub struct GlobPattern {
    source: String,
    base: PathBuf,
    matcher: GlobMatcher,
    /// `None` when the pattern contains `**`.
    max_depth: Option<usize>,
}

impl fmt::Debug for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobPattern")
            .field("source", &self.source)
            .field("base", &self.base)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl GlobPattern {
    pub fn new(pattern: &str) -> AnyResult<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            bail!("glob pattern must not be empty");
        }
        if trimmed.ends_with('/') {
            bail!("glob pattern '{trimmed}' names a directory, not files");
        }

        let parts: Vec<&str> = trimmed.split('/').collect();
        // Everything before the first component with a glob metacharacter
        // is the base. A pattern without any is matched literally inside
        // its parent directory.
        let split = parts
            .iter()
            .position(|p| p.contains(GLOB_META))
            .unwrap_or(parts.len() - 1);

        let base = match &parts[..split] {
            [] => PathBuf::new(),
            [""] => PathBuf::from("/"),
            prefix => PathBuf::from(prefix.join("/")),
        };
        let rest = parts[split..].join("/");

        let matcher = GlobBuilder::new(&rest)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern '{trimmed}'"))?
            .compile_matcher();

        let max_depth = if rest.contains("**") {
            None
        } else {
            Some(parts.len() - split)
        };

        Ok(Self {
            source: trimmed.to_string(),
            base,
            matcher,
            max_depth,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Literal directory the walk starts from (empty for patterns that
    /// start with a wildcard).
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Files matching this pattern, sorted by path.
    ///
    /// A relative base is resolved against `workdir`. A base directory that
    /// does not exist yields no matches.
    pub fn find_matches(&self, workdir: &Path, fs: &dyn FileSystem) -> AnyResult<Vec<PathBuf>> {
        let root = if self.base.is_absolute() {
            self.base.clone()
        } else {
            workdir.join(&self.base)
        };

        if !fs.is_dir(&root) {
            debug!(base = ?root, "glob base directory does not exist");
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        self.walk(fs, &root, &root, 1, &mut found)?;
        found.sort();
        Ok(found)
    }

    fn walk(
        &self,
        fs: &dyn FileSystem,
        root: &Path,
        dir: &Path,
        depth: usize,
        found: &mut Vec<PathBuf>,
    ) -> AnyResult<()> {
        for entry in fs.read_dir(dir)? {
            if fs.is_dir(&entry) {
                if self.max_depth.is_none_or(|max| depth < max) {
                    self.walk(fs, root, &entry, depth + 1, found)?;
                }
                continue;
            }

            let rel = entry.strip_prefix(root).unwrap_or(&entry);
            if fs.is_file(&entry) && self.matcher.is_match(rel) {
                found.push(entry);
            }
        }
        Ok(())
    }
}

/// Emit one token per file matching `pattern`, in sorted order.
///
/// The port closes when the caller drops it. Returns the number of tokens
/// emitted.
pub async fn run_globber(
    process: &str,
    pattern: &GlobPattern,
    workdir: &Path,
    fs: &dyn FileSystem,
    out: &mut OutPort,
    cancel: &CancellationToken,
) -> Result<usize> {
    let matches = pattern
        .find_matches(workdir, fs)
        .map_err(|e| FlowError::filesystem(process, pattern.base(), format!("{e:#}")))?;

    info!(process = %process, pattern = %pattern, matches = matches.len(), "globbed files");

    let port = out.name().to_string();
    for path in &matches {
        out.send(Token::produced_by(path, process, port.as_str()), cancel)
            .await?;
    }

    Ok(matches.len())
}
