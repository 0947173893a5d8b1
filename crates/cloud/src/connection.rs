//! Shared cloud connection.
//!
//! One `CloudConnection` is built per `[cloud]` section and handed to every
//! node as an `Arc`. It is read-only after construction: nodes never mutate
//! the host, port or token.

use std::sync::Arc;

use pf_domain::config::CloudConfig;
use pf_domain::error::Result;

use crate::provider::DeviceCloud;
use crate::rest::ParticleRestClient;

pub struct CloudConnection {
    base_url: String,
    is_local: bool,
    token: Option<String>,
    api: Arc<dyn DeviceCloud>,
}

impl std::fmt::Debug for CloudConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConnection")
            .field("base_url", &self.base_url)
            .field("is_local", &self.is_local)
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl CloudConnection {
    /// Wrap an arbitrary [`DeviceCloud`] implementation.
    pub fn new(cfg: &CloudConfig, api: Arc<dyn DeviceCloud>) -> Self {
        Self {
            base_url: cfg.base_url(),
            is_local: cfg.is_local(),
            token: cfg.resolve_token(),
            api,
        }
    }

    /// Build a connection backed by the REST client.
    pub fn from_config(cfg: &CloudConfig) -> Result<Self> {
        let client = ParticleRestClient::new(cfg)?;
        let conn = Self::new(cfg, Arc::new(client));
        tracing::info!(
            base_url = %conn.base_url,
            local = conn.is_local,
            has_token = conn.token.is_some(),
            "cloud connection ready"
        );
        Ok(conn)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    /// The bearer token, if one was configured.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn api(&self) -> &dyn DeviceCloud {
        self.api.as_ref()
    }
}
