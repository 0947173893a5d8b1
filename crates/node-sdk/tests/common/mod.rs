//! Recording `DeviceCloud` double shared by the node integration tests.
//!
//! Every call is recorded with its (virtual) time offset from creation.
//! Event streams are fed by the test through [`RecordingCloud::push_event`],
//! [`RecordingCloud::end_stream`] and [`RecordingCloud::fail_stream`]; the
//! double also counts how many subscriptions are alive at once.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pf_cloud::{
    CloudConnection, CloudEvent, CloudResponse, DeviceCall, DeviceCloud, DeviceRef,
    DeviceUpdate, EventStream, PublishParams, StreamFilter,
};
use pf_domain::config::{CloudConfig, NodeDefinition, TimingConfig};
use pf_domain::error::{Error, Result};
use pf_node_sdk::{spawn_node, NodeContext, NodeHandle, Outbound};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Duration,
    pub operation: &'static str,
    pub detail: Value,
}

type StreamSender = mpsc::UnboundedSender<Result<CloudEvent>>;

pub struct RecordingCloud {
    start: Instant,
    calls: Mutex<Vec<RecordedCall>>,
    streams: Mutex<Vec<Option<StreamSender>>>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    status: Mutex<u16>,
}

/// Decrements the live-subscription count when the stream is dropped.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            calls: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: Arc::new(AtomicUsize::new(0)),
            status: Mutex::new(200),
        })
    }

    /// Answer every later request with this status.
    pub fn respond_with_status(&self, status: u16) {
        *self.status.lock().unwrap() = status;
    }

    fn record(&self, operation: &'static str, detail: Value) -> CloudResponse {
        self.calls.lock().unwrap().push(RecordedCall {
            at: self.start.elapsed(),
            operation,
            detail,
        });
        let status_code = *self.status.lock().unwrap();
        let body = match operation {
            "call_function" => json!({"id": "dev1", "connected": true, "return_value": 1}),
            "get_variable" => json!({"name": "temp", "result": 21.5, "coreInfo": {"deviceID": "dev1"}}),
            "list_devices" => json!([{"id": "dev1"}]),
            _ => json!({"ok": true}),
        };
        CloudResponse { status_code, body }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    pub fn subscriptions(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live_subscriptions(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn push_event(&self, index: usize, name: &str, data: &str) {
        let streams = self.streams.lock().unwrap();
        if let Some(Some(tx)) = streams.get(index) {
            let _ = tx.send(Ok(CloudEvent {
                name: name.into(),
                data: Some(data.into()),
                ttl: Some(60),
                published_at: None,
                coreid: Some("dev1".into()),
                extra: Default::default(),
            }));
        }
    }

    /// The remote closes subscription `index`.
    pub fn end_stream(&self, index: usize) {
        if let Some(slot) = self.streams.lock().unwrap().get_mut(index) {
            slot.take();
        }
    }

    /// Subscription `index` reports a transport error.
    pub fn fail_stream(&self, index: usize, message: &str) {
        let streams = self.streams.lock().unwrap();
        if let Some(Some(tx)) = streams.get(index) {
            let _ = tx.send(Err(Error::Stream(message.into())));
        }
    }
}

#[async_trait]
impl DeviceCloud for RecordingCloud {
    async fn list_devices(&self, _auth: &str, product: Option<&str>) -> Result<CloudResponse> {
        Ok(self.record("list_devices", json!({ "product": product })))
    }

    async fn get_device(&self, _auth: &str, device: &DeviceRef) -> Result<CloudResponse> {
        Ok(self.record("get_device", json!({ "device": device.device_id })))
    }

    async fn update_device(
        &self,
        _auth: &str,
        device: &DeviceRef,
        update: &DeviceUpdate,
    ) -> Result<CloudResponse> {
        let detail = match update {
            DeviceUpdate::Rename(name) => json!({ "device": device.device_id, "name": name }),
            DeviceUpdate::Signal(on) => json!({ "device": device.device_id, "signal": on }),
        };
        Ok(self.record("update_device", detail))
    }

    async fn claim_device(&self, _auth: &str, device_id: &str) -> Result<CloudResponse> {
        Ok(self.record("claim_device", json!({ "device": device_id })))
    }

    async fn add_device_to_product(
        &self,
        _auth: &str,
        device_id: &str,
        product: &str,
    ) -> Result<CloudResponse> {
        Ok(self.record(
            "add_device_to_product",
            json!({ "device": device_id, "product": product }),
        ))
    }

    async fn get_variable(&self, _auth: &str, call: &DeviceCall) -> Result<CloudResponse> {
        Ok(self.record(
            "get_variable",
            json!({ "device": call.device.device_id, "name": call.name }),
        ))
    }

    async fn call_function(&self, _auth: &str, call: &DeviceCall) -> Result<CloudResponse> {
        Ok(self.record(
            "call_function",
            json!({ "device": call.device.device_id, "name": call.name, "argument": call.argument }),
        ))
    }

    async fn publish_event(&self, _auth: &str, params: &PublishParams) -> Result<CloudResponse> {
        Ok(self.record(
            "publish_event",
            json!({ "name": params.name, "data": params.data, "private": params.private, "ttl": params.ttl }),
        ))
    }

    async fn event_stream(&self, _auth: &str, filter: &StreamFilter) -> Result<EventStream> {
        self.record("event_stream", json!({ "path": filter.path_segments().join("/") }));

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push(Some(tx));

        let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now_live, Ordering::SeqCst);
        let guard = LiveGuard(self.live.clone());

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            while let Some(item) = rx.recv().await {
                yield item;
            }
        }))
    }
}

// ── Node harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub cloud: Arc<RecordingCloud>,
    pub node: NodeHandle,
    pub outbound: mpsc::Receiver<Outbound>,
}

pub fn spawn_with(definition: NodeDefinition, token: Option<&str>) -> Harness {
    spawn_with_timing(definition, token, TimingConfig::default())
}

pub fn spawn_with_timing(
    definition: NodeDefinition,
    token: Option<&str>,
    timing: TimingConfig,
) -> Harness {
    let cloud = RecordingCloud::new();
    let cfg = CloudConfig {
        access_token: token.map(str::to_owned),
        access_token_env: "PF_NODE_TEST_TOKEN_UNSET".into(),
        ..Default::default()
    };
    let connection = CloudConnection::new(&cfg, cloud.clone());
    let (tx, rx) = mpsc::channel(64);
    let node = spawn_node(
        definition,
        NodeContext {
            connection: Arc::new(connection),
            timing,
            outbound: tx,
        },
    );
    Harness {
        cloud,
        node,
        outbound: rx,
    }
}

/// Let spawned tasks run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
