mod cloud;
mod logging;
mod nodes;
mod timing;

pub use cloud::*;
pub use logging::*;
pub use nodes::*;
pub use timing::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::limits::MAX_NAME_CHARS;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Flow nodes, spawned in declaration order.
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Check the config for problems that would make nodes refuse to run.
    ///
    /// Nothing here is fatal on its own: nodes with a missing credential or
    /// device id still start, but sit in a degraded status.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.cloud.host.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "cloud.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.cloud.resolve_token().is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "cloud.access_token".into(),
                message: format!(
                    "no access token configured (set access_token or ${})",
                    self.cloud.access_token_env
                ),
            });
        }

        if self.timing.debounce_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "timing.debounce_ms".into(),
                message: "zero debounce disables coalescing of message bursts".into(),
            });
        }

        if self.timing.keepalive_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "timing.keepalive_secs".into(),
                message: "keepalive must be at least 1 second".into(),
            });
        }

        if self.timing.end_reconnect_delay_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "timing.end_reconnect_delay_ms".into(),
                message: "zero delay re-subscribes immediately after the cloud closes a stream".into(),
            });
        }

        let mut seen = HashSet::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let id = node.id();
            if id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("nodes[{i}].id"),
                    message: "node id must not be empty".into(),
                });
            } else if !seen.insert(id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("nodes[{i}].id"),
                    message: format!("duplicate node id {id:?}"),
                });
            }

            if node.requires_device() && node.device_spec().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("nodes[{i}].devid"),
                    message: "no device id set; node waits for a devid message".into(),
                });
            }

            if let Some(name) = node.remote_name() {
                if name.chars().count() > MAX_NAME_CHARS {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Warning,
                        field: format!("nodes[{i}]"),
                        message: format!("name longer than {MAX_NAME_CHARS} chars will be truncated"),
                    });
                }
            }
        }

        errors
    }
}
