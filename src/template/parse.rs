// src/template/parse.rs

use std::sync::LazyLock;

use regex::Regex;

use super::transform::Transform;
use super::{Placeholder, PlaceholderKind, Segment, TemplateError};

/// `{i:port}`, `{o:port|basename}`, ... Only the engine's own kinds are
/// matched so shell syntax such as `${VAR:-x}` or `{a,b}` passes through.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([iof]):([^{}|]*)((?:\|[^{}|]*)*)\}").expect("placeholder regex is valid")
});

/// Start of a placeholder that never got closed.
static UNTERMINATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[iof]:").expect("unterminated regex is valid"));

static PORT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("port name regex is valid"));

pub(crate) fn parse_segments(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        push_literal(&mut segments, &source[last..whole.start()])?;
        last = whole.end();

        let kind = PlaceholderKind::from_tag(&caps[1]).ok_or_else(|| TemplateError::Malformed {
            placeholder: whole.as_str().to_string(),
            reason: format!("unknown placeholder kind '{}'", &caps[1]),
        })?;

        let port = caps[2].trim();
        if !PORT_NAME_RE.is_match(port) {
            return Err(TemplateError::Malformed {
                placeholder: whole.as_str().to_string(),
                reason: format!("invalid port name '{port}'"),
            });
        }

        let transforms = match caps.get(3).map(|m| m.as_str()).unwrap_or("") {
            "" => Vec::new(),
            pipeline => pipeline[1..]
                .split('|')
                .map(Transform::parse)
                .collect::<Result<Vec<_>, _>>()?,
        };

        segments.push(Segment::Placeholder(Placeholder {
            kind,
            port: port.to_string(),
            transforms,
        }));
    }

    push_literal(&mut segments, &source[last..])?;
    Ok(segments)
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) -> Result<(), TemplateError> {
    if text.is_empty() {
        return Ok(());
    }
    if let Some(m) = UNTERMINATED_RE.find(text) {
        let tail: String = text[m.start()..].chars().take(32).collect();
        return Err(TemplateError::Malformed {
            placeholder: tail,
            reason: "placeholder is not terminated by '}' or contains braces".to_string(),
        });
    }
    segments.push(Segment::Literal(text.to_string()));
    Ok(())
}
