// src/template/resolve.rs

use std::fmt;

use super::{PlaceholderKind, Segment, TemplateError};

/// Which resolution a template is taking part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Computing output paths from inputs (and earlier outputs).
    PathNaming,
    /// Building the command line to execute.
    Command,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PathNaming => f.write_str("naming output paths"),
            Phase::Command => f.write_str("building the command"),
        }
    }
}

/// Ordered set of declared port names, each optionally bound to a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortValues {
    entries: Vec<(String, Option<String>)>,
}

enum Lookup<'a> {
    Undeclared,
    Unbound,
    Bound(&'a str),
}

impl PortValues {
    /// Declare ports without binding any of them.
    pub fn declare<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: names.into_iter().map(|n| (n.into(), None)).collect(),
        }
    }

    /// Bind a declared port. Returns `false` if `port` was never declared.
    pub fn bind(&mut self, port: &str, value: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|(name, _)| name == port) {
            Some((_, slot)) => {
                *slot = Some(value.into());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, port: &str) -> Option<&str> {
        match self.lookup(port) {
            Lookup::Bound(v) => Some(v),
            _ => None,
        }
    }

    /// Bound `(port, value)` pairs in declaration order.
    pub fn bound(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (name.as_str(), v)))
    }

    fn lookup(&self, port: &str) -> Lookup<'_> {
        match self.entries.iter().find(|(name, _)| name == port) {
            None => Lookup::Undeclared,
            Some((_, None)) => Lookup::Unbound,
            Some((_, Some(v))) => Lookup::Bound(v),
        }
    }
}

/// Everything a template may read from during one resolution.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub phase: Phase,
    pub inputs: &'a PortValues,
    pub pending: &'a PortValues,
    pub resolved: &'a PortValues,
}

pub(crate) fn resolve_segments(
    segments: &[Segment],
    scope: &Scope<'_>,
) -> Result<String, TemplateError> {
    let mut out = String::new();

    for seg in segments {
        match seg {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder(p) => {
                let values = match p.kind {
                    PlaceholderKind::Input => scope.inputs,
                    PlaceholderKind::PendingOutput if scope.phase == Phase::PathNaming => {
                        return Err(TemplateError::KindNotAllowed {
                            kind: p.kind,
                            phase: scope.phase,
                        });
                    }
                    PlaceholderKind::PendingOutput => scope.pending,
                    PlaceholderKind::ResolvedOutput => scope.resolved,
                };

                let mut value = match values.lookup(&p.port) {
                    Lookup::Bound(v) => v.to_string(),
                    Lookup::Unbound => {
                        return Err(TemplateError::Unbound {
                            kind: p.kind,
                            port: p.port.clone(),
                        });
                    }
                    Lookup::Undeclared => {
                        return Err(TemplateError::UndeclaredPort {
                            kind: p.kind,
                            port: p.port.clone(),
                        });
                    }
                };

                for transform in &p.transforms {
                    value = transform.apply(&value)?;
                }
                out.push_str(&value);
            }
        }
    }

    Ok(out)
}
