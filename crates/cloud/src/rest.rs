//! REST implementation of [`DeviceCloud`].
//!
//! `ParticleRestClient` wraps two `reqwest::Client`s: one with a request
//! timeout for ordinary calls and one with only a connect timeout for the
//! long-lived event stream. Requests are never retried here; the nodes'
//! repeat and keepalive schedules are the only retry mechanism.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use pf_domain::config::CloudConfig;
use pf_domain::error::{Error, Result};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;

use crate::provider::{DeviceCloud, EventStream};
use crate::sse;
use crate::types::{
    CloudResponse, DeviceCall, DeviceRef, DeviceUpdate, PublishParams, StreamFilter,
};

const API_VERSION: &str = "v1";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST client for the Particle cloud (public or self-hosted).
///
/// Created once per cloud connection and shared by every node using it.
#[derive(Debug, Clone)]
pub struct ParticleRestClient {
    http: Client,
    stream_http: Client,
    base_url: Url,
    timeout: Duration,
}

impl ParticleRestClient {
    /// Build a new client from the shared `CloudConfig`.
    pub fn new(cfg: &CloudConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        let stream_http = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let base_url = Url::parse(&cfg.base_url())
            .map_err(|e| Error::Config(format!("invalid cloud host {:?}: {e}", cfg.host)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("cloud host {:?} is not a base URL", cfg.host)));
        }

        Ok(Self {
            http,
            stream_http,
            base_url,
            timeout,
        })
    }

    /// The configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Build `{base}/v1/{segments...}`, percent-encoding each segment.
    fn url<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Config("cloud host is not a base URL".into()))?;
            path.pop_if_empty().push(API_VERSION);
            for segment in segments {
                path.push(segment.as_ref());
            }
        }
        Ok(url)
    }

    /// Path segments for a device, scoped to a product when given.
    fn device_segments<'a>(device: &'a DeviceRef) -> Vec<&'a str> {
        let mut segments = Vec::with_capacity(4);
        if let Some(product) = device.product.as_deref() {
            segments.extend(["products", product]);
        }
        segments.extend(["devices", device.device_id.as_str()]);
        segments
    }

    /// Send a request and capture status + body. Non-JSON bodies are kept
    /// as a JSON string.
    async fn send(&self, endpoint: &str, rb: RequestBuilder, auth: &str) -> Result<CloudResponse> {
        let start = Instant::now();
        let resp = rb.bearer_auth(auth).send().await.map_err(from_reqwest)?;
        let status_code = resp.status().as_u16();
        let text = resp.text().await.map_err(from_reqwest)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        tracing::debug!(
            endpoint = %endpoint,
            status = status_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "cloud request completed"
        );

        Ok(CloudResponse { status_code, body })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl DeviceCloud for ParticleRestClient {
    async fn list_devices(&self, auth: &str, product: Option<&str>) -> Result<CloudResponse> {
        let url = match product {
            Some(p) => self.url(&["products", p, "devices"])?,
            None => self.url(&["devices"])?,
        };
        self.send("GET devices", self.http.get(url), auth).await
    }

    async fn get_device(&self, auth: &str, device: &DeviceRef) -> Result<CloudResponse> {
        let url = self.url(&Self::device_segments(device))?;
        self.send("GET device", self.http.get(url), auth).await
    }

    async fn update_device(
        &self,
        auth: &str,
        device: &DeviceRef,
        update: &DeviceUpdate,
    ) -> Result<CloudResponse> {
        let url = self.url(&Self::device_segments(device))?;
        let rb = match update {
            DeviceUpdate::Rename(name) => self.http.put(url).form(&[("name", name.as_str())]),
            DeviceUpdate::Signal(on) => self
                .http
                .put(url)
                .form(&[("signal", if *on { "1" } else { "0" })]),
        };
        self.send("PUT device", rb, auth).await
    }

    async fn claim_device(&self, auth: &str, device_id: &str) -> Result<CloudResponse> {
        let url = self.url(&["devices"])?;
        let rb = self.http.post(url).form(&[("id", device_id)]);
        self.send("POST devices", rb, auth).await
    }

    async fn add_device_to_product(
        &self,
        auth: &str,
        device_id: &str,
        product: &str,
    ) -> Result<CloudResponse> {
        let url = self.url(&["products", product, "devices"])?;
        let rb = self.http.post(url).form(&[("id", device_id)]);
        self.send("POST product devices", rb, auth).await
    }

    async fn get_variable(&self, auth: &str, call: &DeviceCall) -> Result<CloudResponse> {
        let mut segments = Self::device_segments(&call.device);
        segments.push(call.name.as_str());
        let url = self.url(&segments)?;
        self.send("GET variable", self.http.get(url), auth).await
    }

    async fn call_function(&self, auth: &str, call: &DeviceCall) -> Result<CloudResponse> {
        let mut segments = Self::device_segments(&call.device);
        segments.push(call.name.as_str());
        let url = self.url(&segments)?;
        let arg = call.argument.as_deref().unwrap_or_default();
        let rb = self.http.post(url).form(&[("arg", arg)]);
        self.send("POST function", rb, auth).await
    }

    async fn publish_event(&self, auth: &str, params: &PublishParams) -> Result<CloudResponse> {
        let url = match params.product.as_deref() {
            Some(p) => self.url(&["products", p, "events"])?,
            None => self.url(&["devices", "events"])?,
        };
        let ttl = params.ttl.to_string();
        let rb = self.http.post(url).form(&[
            ("name", params.name.as_str()),
            ("data", params.data.as_str()),
            ("private", if params.private { "true" } else { "false" }),
            ("ttl", ttl.as_str()),
        ]);
        self.send("POST events", rb, auth).await
    }

    async fn event_stream(&self, auth: &str, filter: &StreamFilter) -> Result<EventStream> {
        let url = self.url(&filter.path_segments())?;
        tracing::debug!(url = %url, "opening event stream");

        let resp = self
            .stream_http
            .get(url)
            .bearer_auth(auth)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(Error::Remote {
                status: status.as_u16(),
                message: error_message(&body, status.as_u16()),
                body,
            });
        }

        Ok(sse::event_stream(resp))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Human-readable message from a cloud error body (`{"error": "..."}` or
/// `{"error_description": "..."}`), falling back to the status code.
pub fn error_message(body: &Value, status: u16) -> String {
    ["error_description", "error", "message"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP {status}"))
}
