// src/template/transform.rs

use std::fmt;
use std::path::Path;

use super::TemplateError;

/// One step of a placeholder's transform pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// `basename`: strip directory components.
    Basename,
    /// `dirname`: keep only the directory part (`.` when there is none).
    Dirname,
    /// `%suffix`: remove a literal trailing suffix; error if absent.
    StripSuffix(String),
    /// `s/search/replace/`: replace every literal occurrence.
    Replace { search: String, replace: String },
}

impl Transform {
    pub fn parse(spec: &str) -> Result<Self, TemplateError> {
        let spec = spec.trim();
        match spec {
            "basename" => return Ok(Transform::Basename),
            "dirname" => return Ok(Transform::Dirname),
            _ => {}
        }

        if let Some(suffix) = spec.strip_prefix('%') {
            if suffix.is_empty() {
                return Err(TemplateError::UnknownTransform(spec.to_string()));
            }
            return Ok(Transform::StripSuffix(suffix.to_string()));
        }

        if let Some(body) = spec.strip_prefix("s/") {
            if let Some((search, rest)) = body.split_once('/') {
                if let Some(replace) = rest.strip_suffix('/') {
                    if !search.is_empty() && !replace.contains('/') {
                        return Ok(Transform::Replace {
                            search: search.to_string(),
                            replace: replace.to_string(),
                        });
                    }
                }
            }
        }

        Err(TemplateError::UnknownTransform(spec.to_string()))
    }

    pub fn apply(&self, value: &str) -> Result<String, TemplateError> {
        match self {
            Transform::Basename => Ok(Path::new(value)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()),
            Transform::Dirname => Ok(match Path::new(value).parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
                _ => ".".to_string(),
            }),
            Transform::StripSuffix(suffix) => value
                .strip_suffix(suffix.as_str())
                .map(str::to_string)
                .ok_or_else(|| TemplateError::SuffixMismatch {
                    value: value.to_string(),
                    suffix: suffix.clone(),
                }),
            Transform::Replace { search, replace } => Ok(value.replace(search.as_str(), replace)),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Basename => f.write_str("basename"),
            Transform::Dirname => f.write_str("dirname"),
            Transform::StripSuffix(s) => write!(f, "%{s}"),
            Transform::Replace { search, replace } => write!(f, "s/{search}/{replace}/"),
        }
    }
}
