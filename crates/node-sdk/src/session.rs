//! Event stream session.
//!
//! A `StreamSession` is the actor behind an events node. It keeps exactly
//! one live subscription, forwards matching events, and re-subscribes:
//!
//! - 3 s after the remote ends the stream
//! - on every keepalive tick (5 min), whatever the connection state
//! - one debounce after a filter change (`evtname`, `devid`,
//!   `productIdOrSlug`, `orgSlug`, `strict`, `reconnect`)
//!
//! A transport error only marks the status unless
//! `timing.reconnect_on_error` is set.
//!
//! The subscription runs on a reader task. Events go straight from the
//! reader to the node's output, waiting for room rather than dropping, and
//! the strict name filter is read from a watch of the current
//! configuration. Lifecycle changes are reported back to the actor tagged
//! with the generation they belong to. Signals from an older generation are
//! dropped, and the previous reader is fully stopped before a new subscribe
//! is issued. A `keepalive_secs` of 0 disables the periodic re-subscribe.

use std::time::Duration;

use futures_util::StreamExt;
use pf_cloud::{CloudEvent, StreamFilter, StreamScope};
use pf_domain::config::{EventsNodeConfig, SubscribeKind};
use pf_domain::limits::MAX_NAME_CHARS;
use pf_domain::message::{is_truthy, value_to_text, Message};
use pf_domain::trace::TraceEvent;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::nodes::{sleep_until_opt, truncate_field};
use crate::status::{NodeStatus, StatusLevel, StatusShape, NO_TOKEN_TEXT};
use crate::types::{NodeContext, Outbound};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

#[derive(Debug)]
enum StreamSignal {
    Connected,
    Error(String),
    End,
    SubscribeFailed(String),
}

#[derive(Debug)]
struct Tagged {
    generation: u64,
    signal: StreamSignal,
}

/// The name filter the reader applies before forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EventGate {
    strict: bool,
    name: String,
}

impl EventGate {
    fn of(cfg: &EventsNodeConfig) -> Self {
        Self {
            strict: cfg.strict,
            name: cfg.evtname.clone(),
        }
    }

    fn admits(&self, event: &CloudEvent) -> bool {
        !self.strict || event.name == self.name
    }
}

pub struct StreamSession {
    cfg: EventsNodeConfig,
    ctx: NodeContext,
    status: watch::Sender<NodeStatus>,
    state: StreamState,
    generation: u64,
    reader: Option<JoinHandle<()>>,
    gate: watch::Sender<EventGate>,
    signals_tx: mpsc::Sender<Tagged>,
    signals_rx: mpsc::Receiver<Tagged>,
    pending_initiate: Option<Instant>,
    prop_changed: bool,
}

impl StreamSession {
    pub fn new(
        mut cfg: EventsNodeConfig,
        ctx: NodeContext,
        status: watch::Sender<NodeStatus>,
    ) -> Self {
        truncate_field(&cfg.id, "evtname", &mut cfg.evtname, MAX_NAME_CHARS);
        let (signals_tx, signals_rx) = mpsc::channel(256);
        let (gate, _) = watch::channel(EventGate::of(&cfg));
        Self {
            cfg,
            ctx,
            status,
            state: StreamState::Disconnected,
            generation: 0,
            reader: None,
            gate,
            signals_tx,
            signals_rx,
            pending_initiate: None,
            prop_changed: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The subscription filter for the current configuration.
    pub fn filter(&self) -> StreamFilter {
        let slug = self.cfg.devprodslug.trim();
        let scope = match self.cfg.subscribe {
            SubscribeKind::Mine => StreamScope::Mine,
            SubscribeKind::All => StreamScope::Firehose,
            // A blank device, product or org falls back to the firehose.
            _ if slug.is_empty() => {
                tracing::info!(
                    node_id = %self.cfg.id,
                    subscribe = ?self.cfg.subscribe,
                    "no device/product/org set, subscribing to the public feed"
                );
                StreamScope::Firehose
            }
            SubscribeKind::Devid => StreamScope::Device(slug.to_owned()),
            SubscribeKind::ProductIdOrSlug => StreamScope::Product(slug.to_owned()),
            SubscribeKind::OrgSlug => StreamScope::Org(slug.to_owned()),
        };
        StreamFilter {
            scope,
            name: Some(self.cfg.evtname.clone()).filter(|n| !n.is_empty()),
        }
    }

    /// Actor loop; returns after teardown.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<Message>, cancel: CancellationToken) {
        let timing = self.ctx.timing.clone();
        let configured = self.ctx.connection.has_token();
        if configured {
            self.status.send_replace(NodeStatus::Clear);
        } else {
            tracing::error!(node_id = %self.cfg.id, "no access token in cloud configuration");
            self.status.send_replace(NodeStatus::error(NO_TOKEN_TEXT));
        }

        let start = Instant::now();
        self.pending_initiate = Some(start + timing.debounce());
        let mut keepalive = keepalive_interval(start, timing.keepalive());
        if keepalive.is_none() {
            tracing::warn!(node_id = %self.cfg.id, "keepalive disabled");
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = inbox.recv() => {
                    let Some(message) = received else { break };
                    self.apply(message);
                }
                Some(tagged) = self.signals_rx.recv() => {
                    self.on_signal(tagged);
                }
                _ = sleep_until_opt(self.pending_initiate) => {
                    self.pending_initiate = None;
                    self.initiate().await;
                }
                _ = next_tick(&mut keepalive) => {
                    TraceEvent::StreamKeepalive { node_id: self.cfg.id.clone() }.emit();
                    self.initiate().await;
                }
            }
        }

        self.teardown().await;
    }

    /// Replace the live subscription with a fresh one for the current filter.
    async fn initiate(&mut self) {
        self.abort_reader().await;
        self.generation += 1;

        let Some(token) = self.ctx.connection.token().map(str::to_owned) else {
            tracing::warn!(node_id = %self.cfg.id, "subscribe refused: no access token");
            self.state = StreamState::Disconnected;
            return;
        };

        self.state = StreamState::Connecting;
        self.status.send_replace(NodeStatus::info("Connecting..."));

        let filter = self.filter();
        TraceEvent::StreamConnecting {
            node_id: self.cfg.id.clone(),
            generation: self.generation,
            url: format!("/v1/{}", filter.path_segments().join("/")),
        }
        .emit();

        let generation = self.generation;
        let connection = self.ctx.connection.clone();
        let tx = self.signals_tx.clone();
        let gate = self.gate.subscribe();
        let outbound = self.ctx.outbound.clone();
        let node_id = self.cfg.id.clone();
        self.reader = Some(tokio::spawn(async move {
            let send = |signal| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(Tagged { generation, signal }).await;
                }
            };

            let mut stream = match connection.api().event_stream(&token, &filter).await {
                Ok(s) => s,
                Err(e) => {
                    send(StreamSignal::SubscribeFailed(e.to_string())).await;
                    return;
                }
            };
            send(StreamSignal::Connected).await;

            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => {
                        let admitted = gate.borrow().admits(&event);
                        if admitted && !forward(&node_id, &outbound, event).await {
                            return;
                        }
                    }
                    Err(e) => {
                        send(StreamSignal::Error(e.to_string())).await;
                        return;
                    }
                }
            }
            send(StreamSignal::End).await;
        }));
    }

    /// Stop the current reader and wait until its subscription is released.
    async fn abort_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            tracing::trace!(node_id = %self.cfg.id, generation = self.generation, "aborting live subscription");
            reader.abort();
            let _ = reader.await;
        }
    }

    fn on_signal(&mut self, tagged: Tagged) {
        if tagged.generation != self.generation {
            tracing::trace!(node_id = %self.cfg.id, stale = tagged.generation, "dropping stale stream signal");
            return;
        }

        let timing = self.ctx.timing.clone();
        match tagged.signal {
            StreamSignal::Connected => {
                self.state = StreamState::Connected;
                let (shape, text) = if self.prop_changed {
                    (StatusShape::Ring, "Property UPDATED OK")
                } else {
                    (StatusShape::Dot, "Connected")
                };
                self.status
                    .send_replace(NodeStatus::shown(StatusLevel::Success, shape, text));
                TraceEvent::StreamConnected {
                    node_id: self.cfg.id.clone(),
                    generation: self.generation,
                }
                .emit();
            }
            StreamSignal::End => {
                let delay = timing.end_reconnect_delay();
                tracing::error!(
                    node_id = %self.cfg.id,
                    delay_ms = delay.as_millis() as u64,
                    "event stream ended, reconnecting"
                );
                TraceEvent::StreamEnded {
                    node_id: self.cfg.id.clone(),
                    generation: self.generation,
                    reconnect_in_ms: delay.as_millis() as u64,
                }
                .emit();
                self.reader = None;
                self.state = StreamState::Reconnecting;
                self.status.send_replace(NodeStatus::info("Reconnecting..."));
                self.pending_initiate = Some(Instant::now() + delay);
            }
            StreamSignal::Error(error) => {
                tracing::error!(node_id = %self.cfg.id, error = %error, "event stream error");
                self.reader = None;
                self.status
                    .send_replace(NodeStatus::error("Stream error - refer to debug/log"));
                if timing.reconnect_on_error {
                    self.state = StreamState::Reconnecting;
                    self.pending_initiate = Some(Instant::now() + timing.end_reconnect_delay());
                } else {
                    self.state = StreamState::Disconnected;
                }
            }
            StreamSignal::SubscribeFailed(error) => {
                tracing::error!(node_id = %self.cfg.id, error = %error, "subscribe failed");
                self.reader = None;
                self.state = StreamState::Disconnected;
                self.status
                    .send_replace(NodeStatus::error("Error - refer to debug/log"));
            }
        }
    }

    /// Apply a configuration message. Filter changes schedule a debounced
    /// re-subscribe.
    fn apply(&mut self, message: Message) {
        let text = value_to_text(&message.payload);
        let valid = match message.topic() {
            Some("evtname") => {
                self.cfg.evtname = text;
                truncate_field(&self.cfg.id, "evtname", &mut self.cfg.evtname, MAX_NAME_CHARS);
                self.prop_changed = true;
                true
            }
            Some("devid") => {
                self.cfg.subscribe = SubscribeKind::Devid;
                self.cfg.devprodslug = text;
                self.prop_changed = true;
                true
            }
            Some("strict") => {
                self.cfg.strict = is_truthy(&message.payload);
                true
            }
            Some(topic @ ("productIdOrSlug" | "orgSlug")) => {
                if text.trim().is_empty() {
                    tracing::warn!(node_id = %self.cfg.id, topic, "ignored invalid new {topic}");
                    false
                } else {
                    self.cfg.subscribe = if topic == "orgSlug" {
                        SubscribeKind::OrgSlug
                    } else {
                        SubscribeKind::ProductIdOrSlug
                    };
                    self.cfg.devprodslug = text;
                    self.prop_changed = true;
                    true
                }
            }
            Some("reconnect") => true,
            _ => false,
        };

        if valid {
            self.gate.send_replace(EventGate::of(&self.cfg));
            tracing::trace!(node_id = %self.cfg.id, topic = ?message.topic(), "filter changed");
            self.state = StreamState::Reconnecting;
            if self.ctx.connection.has_token() {
                self.status.send_replace(NodeStatus::info("Reconnecting..."));
            }
            self.pending_initiate = Some(Instant::now() + self.ctx.timing.debounce());
        }
    }

    /// Release everything; runs on every exit path of the actor.
    async fn teardown(&mut self) {
        self.pending_initiate = None;
        self.abort_reader().await;
        self.state = StreamState::Closed;
        self.status.send_replace(NodeStatus::info("Closed"));
        TraceEvent::NodeClosed {
            node_id: self.cfg.id.clone(),
            kind: "events".into(),
        }
        .emit();
    }
}

/// Send one event to the node's output, waiting while it is full. Returns
/// false once the output is gone.
async fn forward(node_id: &str, outbound: &mpsc::Sender<Outbound>, event: CloudEvent) -> bool {
    let payload = match serde_json::to_value(&event) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(node_id = %node_id, error = %e, "failed to encode event");
            return true;
        }
    };
    tracing::trace!(node_id = %node_id, event = %event.name, "forwarding event");
    let out = Outbound {
        node: node_id.to_owned(),
        message: Message::new(payload),
    };
    if outbound.send(out).await.is_err() {
        tracing::debug!(node_id = %node_id, "output closed, stopping reader");
        return false;
    }
    true
}

/// The periodic re-subscribe timer; `None` when `period` is zero.
fn keepalive_interval(start: Instant, period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn next_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
