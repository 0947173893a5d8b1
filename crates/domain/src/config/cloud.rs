use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Device cloud connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Public Particle cloud endpoint. Any other host is treated as a
/// self-hosted (local) cloud.
pub const PARTICLE_CLOUD_HOST: &str = "https://api.particle.io";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default = "d_host")]
    pub host: String,
    /// Only used for self-hosted clouds.
    #[serde(default = "d_443")]
    pub port: u16,
    /// Inline access token. Prefer `access_token_env` outside of tests.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "d_token_env")]
    pub access_token_env: String,
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: 443,
            access_token: None,
            access_token_env: d_token_env(),
            timeout_ms: 30_000,
        }
    }
}

impl CloudConfig {
    pub fn is_local(&self) -> bool {
        self.host.trim_end_matches('/') != PARTICLE_CLOUD_HOST
    }

    /// Base URL for API requests, without a trailing slash.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if self.is_local() {
            format!("{host}:{}", self.port)
        } else {
            host.to_owned()
        }
    }

    /// The inline token wins over the environment variable. Blank values
    /// count as absent.
    pub fn resolve_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.access_token_env)
                    .ok()
                    .filter(|t| !t.trim().is_empty())
            })
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    PARTICLE_CLOUD_HOST.into()
}
fn d_443() -> u16 {
    443
}
fn d_token_env() -> String {
    "PARTICLE_ACCESS_TOKEN".into()
}
fn d_30000() -> u64 {
    30_000
}
