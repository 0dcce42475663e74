//! Minimal JSONPath evaluator for connector slot mappings
//!
//! Supported syntax, deliberately small:
//! - optional leading `$` root marker (`$.a.b` and `a.b` are equivalent)
//! - dot-separated object keys
//! - one trailing integer index per segment (`items[0]`, or `[0]` alone)
//!
//! Wildcards, filters, slices, quoted keys and recursive descent are not
//! supported and are rejected as invalid expressions.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// JSONPath errors. Every variant names the full offending path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonPathError {
    #[error("Invalid path expression: {path}")]
    InvalidPath { path: String },

    #[error("Path not found: {path} (no value at '{segment}')")]
    NotFound { path: String, segment: String },

    #[error("Expected array at '{segment}' in path {path}")]
    ExpectedArray { path: String, segment: String },
}

impl JsonPathError {
    pub fn path(&self) -> &str {
        match self {
            JsonPathError::InvalidPath { path }
            | JsonPathError::NotFound { path, .. }
            | JsonPathError::ExpectedArray { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    key: Option<String>,
    index: Option<usize>,
    raw: String,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expr: &str) -> Result<Self, JsonPathError> {
        let raw = expr.to_string();
        let invalid = || JsonPathError::InvalidPath { path: raw.clone() };

        let trimmed = expr.trim();
        let rest = match trimmed.strip_prefix('$') {
            Some(after) if after.is_empty() || after.starts_with(['.', '[']) => after,
            Some(_) => return Err(invalid()),
            None => trimmed,
        };
        let rest = rest.strip_prefix('.').unwrap_or(rest);

        if rest.is_empty() {
            // `$` alone addresses the whole document; a bare empty string does not.
            if trimmed.starts_with('$') {
                return Ok(Self {
                    raw,
                    segments: Vec::new(),
                });
            }
            return Err(invalid());
        }

        let mut segments = Vec::new();
        for part in rest.split('.') {
            segments.push(parse_segment(part).ok_or_else(invalid)?);
        }

        Ok(Self { raw, segments })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Walk `root` along the path.
    pub fn evaluate<'a>(&self, root: &'a Value) -> Result<&'a Value, JsonPathError> {
        let mut current = root;

        for segment in &self.segments {
            if let Some(key) = &segment.key {
                current = current
                    .as_object()
                    .and_then(|obj| obj.get(key))
                    .ok_or_else(|| JsonPathError::NotFound {
                        path: self.raw.clone(),
                        segment: segment.raw.clone(),
                    })?;
            }

            if let Some(index) = segment.index {
                let array = current
                    .as_array()
                    .ok_or_else(|| JsonPathError::ExpectedArray {
                        path: self.raw.clone(),
                        segment: segment.raw.clone(),
                    })?;
                current = array.get(index).ok_or_else(|| JsonPathError::NotFound {
                    path: self.raw.clone(),
                    segment: segment.raw.clone(),
                })?;
            }
        }

        Ok(current)
    }
}

impl FromStr for JsonPath {
    type Err = JsonPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse and evaluate in one step.
pub fn resolve_path<'a>(root: &'a Value, expr: &str) -> Result<&'a Value, JsonPathError> {
    JsonPath::parse(expr)?.evaluate(root)
}

fn parse_segment(part: &str) -> Option<Segment> {
    if part.is_empty() {
        return None;
    }

    let (key, index) = match part.find('[') {
        Some(open) => {
            let inner = part[open + 1..].strip_suffix(']')?;
            let index = inner.parse::<usize>().ok()?;
            (&part[..open], Some(index))
        }
        None => (part, None),
    };

    if key.contains(['[', ']', '*']) {
        return None;
    }

    Some(Segment {
        key: (!key.is_empty()).then(|| key.to_string()),
        index,
        raw: part.to_string(),
    })
}
