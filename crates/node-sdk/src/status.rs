//! Node status indicator.
//!
//! Each node publishes its current phase on a `watch` channel. The host
//! decides how to render it; only the triggering conditions are fixed here.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusShape {
    Dot,
    Ring,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Clear,
    Shown {
        level: StatusLevel,
        shape: StatusShape,
        text: String,
    },
}

impl NodeStatus {
    pub fn info(text: impl Into<String>) -> Self {
        Self::shown(StatusLevel::Info, StatusShape::Dot, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::shown(StatusLevel::Success, StatusShape::Dot, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::shown(StatusLevel::Error, StatusShape::Dot, text)
    }

    /// A configuration change acknowledged by the node.
    pub fn changed(topic: &str, value: impl std::fmt::Display) -> Self {
        Self::shown(
            StatusLevel::Success,
            StatusShape::Ring,
            format!("{topic} changed to {value}"),
        )
    }

    pub fn shown(level: StatusLevel, shape: StatusShape, text: impl Into<String>) -> Self {
        Self::Shown {
            level,
            shape,
            text: text.into(),
        }
    }

    pub fn level(&self) -> Option<StatusLevel> {
        match self {
            Self::Clear => None,
            Self::Shown { level, .. } => Some(*level),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Clear => "",
            Self::Shown { text, .. } => text,
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clear => f.write_str("-"),
            Self::Shown { level, text, .. } => write!(f, "{level:?}: {text}"),
        }
    }
}

/// Shown while a node without an access token refuses every call.
pub const NO_TOKEN_TEXT: &str = "No Particle access token";
