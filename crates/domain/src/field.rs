//! Dynamic field resolution.
//!
//! A node parameter such as a device id or a function argument is either a
//! literal (`"e00fce68..."`) or a `{path}` expression that is looked up in
//! the triggering message (`"{payload.deviceId}"`). Paths are plain dotted
//! property lookups; numeric segments index into arrays. Nothing is ever
//! evaluated.

use serde_json::Value;

use crate::message::{value_to_text, Message};

/// Why a `{path}` expression could not be resolved.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("malformed path expression {0:?}")]
    Malformed(String),
    #[error("path {0:?} not found in message")]
    Missing(String),
}

/// A parsed field specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    Literal(String),
    Path(Vec<String>),
}

impl FieldSpec {
    /// Parse a raw specification. A spec is a path when it starts with `{`
    /// (ignoring surrounding whitespace); everything else is a literal.
    pub fn parse(raw: &str) -> Result<Self, ResolutionError> {
        let trimmed = raw.trim();
        let Some(inner) = trimmed.strip_prefix('{') else {
            return Ok(Self::Literal(raw.to_owned()));
        };
        let inner = inner
            .strip_suffix('}')
            .ok_or_else(|| ResolutionError::Malformed(raw.to_owned()))?
            .trim();

        // `{msg.payload.x}` reads the same as `{payload.x}`.
        let inner = inner.strip_prefix("msg.").unwrap_or(inner);

        let segments: Vec<String> = inner.split('.').map(|s| s.trim().to_owned()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ResolutionError::Malformed(raw.to_owned()));
        }
        Ok(Self::Path(segments))
    }

    pub fn is_path(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    /// Resolve against a message context.
    pub fn resolve(&self, context: &Message) -> Result<Value, ResolutionError> {
        match self {
            Self::Literal(s) => Ok(Value::String(s.clone())),
            Self::Path(segments) => {
                let missing = || ResolutionError::Missing(segments.join("."));
                let (head, rest) = segments.split_first().ok_or_else(missing)?;
                let mut current = context.get(head).ok_or_else(missing)?;
                for segment in rest {
                    current = step(&current, segment).ok_or_else(missing)?;
                }
                Ok(current)
            }
        }
    }
}

fn step(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i).cloned()),
        _ => None,
    }
}

/// Resolve a raw spec against a message.
pub fn resolve(spec: &str, context: &Message) -> Result<Value, ResolutionError> {
    FieldSpec::parse(spec)?.resolve(context)
}

/// Resolve a raw spec and render the result as text (device ids, arguments).
pub fn resolve_text(spec: &str, context: &Message) -> Result<String, ResolutionError> {
    resolve(spec, context).map(|v| value_to_text(&v))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
