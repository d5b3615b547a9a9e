// src/template/mod.rs

//! Placeholder templates for commands and output paths.
//!
//! A template is ordinary text with embedded placeholders of the form
//! `{kind:port}` or `{kind:port|transform|transform...}`:
//!
//! - `{i:letters}` is the path of the token bound to input `letters`.
//! - `{o:combined}` is the *pending* path the command writes output
//!   `combined` to. Only meaningful in commands.
//! - `{f:combined}` is the *final* path of output `combined`. Usable in
//!   commands and in output path templates (for outputs resolved earlier).
//!
//! Transforms run left to right, e.g. `{i:letters|basename|%.txt}` turns
//! `/tmp/letterfile_a.txt` into `letterfile_a`.
//!
//! Templates are parsed once, when a process or output path is declared,
//! so grammar problems and unknown transforms surface as configuration
//! errors. Resolution against concrete tokens happens per task instance.

pub mod parse;
pub mod resolve;
pub mod transform;

use std::fmt;

use thiserror::Error;

pub use resolve::{Phase, PortValues, Scope};
pub use transform::Transform;

/// Which port namespace a placeholder reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// `i`: bound input token path.
    Input,
    /// `o`: pending output path the command writes to.
    PendingOutput,
    /// `f`: final, resolved output path.
    ResolvedOutput,
}

impl PlaceholderKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "i" => Some(PlaceholderKind::Input),
            "o" => Some(PlaceholderKind::PendingOutput),
            "f" => Some(PlaceholderKind::ResolvedOutput),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            PlaceholderKind::Input => "i",
            PlaceholderKind::PendingOutput => "o",
            PlaceholderKind::ResolvedOutput => "f",
        }
    }

    pub fn is_output(self) -> bool {
        !matches!(self, PlaceholderKind::Input)
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single `{kind:port|...}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub port: String,
    pub transforms: Vec<Transform>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`, rejecting malformed placeholders and unknown
    /// transforms.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let segments = parse::parse_segments(source)?;
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Placeholder(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    /// Port names referenced with a kind matching `pred`, deduplicated, in
    /// order of first appearance.
    pub fn ports_where(&self, pred: impl Fn(PlaceholderKind) -> bool) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for p in self.placeholders() {
            if pred(p.kind) && !names.iter().any(|n| n == &p.port) {
                names.push(p.port.clone());
            }
        }
        names
    }

    /// Substitute every placeholder using the values in `scope`.
    pub fn resolve(&self, scope: &Scope<'_>) -> Result<String, TemplateError> {
        resolve::resolve_segments(&self.segments, scope)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Errors from parsing or resolving a template.
///
/// Parse-time variants are configuration problems; resolve-time variants
/// are binding problems of one task instance. See [`TemplateError::is_parse_error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("malformed placeholder `{placeholder}`: {reason}")]
    Malformed { placeholder: String, reason: String },

    #[error("unknown transform `{0}`")]
    UnknownTransform(String),

    #[error("placeholder {{{kind}:{port}}} references undeclared port '{port}'")]
    UndeclaredPort { kind: PlaceholderKind, port: String },

    #[error("placeholder {{{kind}:{port}}} references port '{port}' which is not bound yet")]
    Unbound { kind: PlaceholderKind, port: String },

    #[error("placeholder kind '{kind}' cannot be used while {phase}")]
    KindNotAllowed { kind: PlaceholderKind, phase: Phase },

    #[error("value '{value}' does not end with suffix '{suffix}'")]
    SuffixMismatch { value: String, suffix: String },
}

impl TemplateError {
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            TemplateError::Malformed { .. } | TemplateError::UnknownTransform(_)
        )
    }
}
