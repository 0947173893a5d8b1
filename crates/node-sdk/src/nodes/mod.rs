//! Flow nodes.
//!
//! Every node runs as one tokio task that owns its configuration and
//! consumes its inbox in arrival order. The four request/response kinds
//! share [`run_operation`], driven by an [`InvocationThrottle`]; the event
//! stream kind runs a [`StreamSession`](crate::session::StreamSession).
//!
//! Remote calls are spawned off the actor so their completion interleaves
//! with later messages. A request is built from the configuration current
//! at dispatch time and never cancelled once sent.

mod function;
mod publish;
mod utility;
mod variable;

pub use function::FunctionNode;
pub use publish::PublishNode;
pub use utility::UtilityNode;
pub use variable::VariableNode;

use std::future::Future;

use pf_cloud::{invoke, OperationRequest};
use pf_domain::config::NodeDefinition;
use pf_domain::message::Message;
use pf_domain::trace::TraceEvent;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::session::StreamSession;
use crate::status::{NodeStatus, NO_TOKEN_TEXT};
use crate::throttle::InvocationThrottle;
use crate::types::{NodeContext, NodeSdkError, Outbound, RequestError};

const INBOX_CAPACITY: usize = 64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operation node contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What an inbound message asks the actor to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Not a recognized control message; nothing changes.
    Ignored,
    /// Configuration changed, no call.
    Updated,
    /// Debounce, then invoke.
    Invoke,
    /// New repeat interval in seconds.
    Repeat(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub effect: Effect,
    pub status: Option<NodeStatus>,
}

impl Applied {
    pub fn new(effect: Effect, status: Option<NodeStatus>) -> Self {
        Self { effect, status }
    }

    pub fn ignored() -> Self {
        Self::new(Effect::Ignored, None)
    }
}

/// A request/response node: mutable configuration plus a request builder.
pub trait OperationNode: Send + 'static {
    fn id(&self) -> &str;

    fn kind(&self) -> &'static str;

    /// Initial repeat interval in seconds.
    fn repeat_secs(&self) -> f64 {
        0.0
    }

    /// Invoke once shortly after start-up.
    fn once(&self) -> bool {
        false
    }

    /// Status shown right after start-up, before any message.
    fn startup_status(&self) -> Option<NodeStatus> {
        None
    }

    /// Apply one inbound message to the configuration.
    fn apply(&mut self, message: Message) -> Applied;

    /// Build a fresh request from the current configuration.
    fn build_request(&self) -> Result<OperationRequest, RequestError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owner-side handle to a running node.
#[derive(Debug)]
pub struct NodeHandle {
    id: String,
    kind: &'static str,
    inbox: mpsc::Sender<Message>,
    status: watch::Receiver<NodeStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl NodeHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Queue an inbound message. Fails only once the node has stopped.
    pub async fn send(&self, message: Message) -> Result<(), NodeSdkError> {
        self.inbox
            .send(message)
            .await
            .map_err(|_| NodeSdkError::Closed(self.id.clone()))
    }

    pub fn status(&self) -> NodeStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<NodeStatus> {
        self.status.clone()
    }

    /// Tear the node down and wait for its task to finish.
    pub async fn close(self) -> Result<(), NodeSdkError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| NodeSdkError::Join(e.to_string()))
    }
}

/// Spawn the node described by `definition` on the current runtime.
pub fn spawn_node(definition: NodeDefinition, ctx: NodeContext) -> NodeHandle {
    let id = definition.id().to_owned();
    let kind = definition.kind();
    let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
    let (status_tx, status_rx) = watch::channel(NodeStatus::Clear);
    let cancel = CancellationToken::new();

    let task = match definition {
        NodeDefinition::Utility(cfg) => tokio::spawn(run_operation(
            UtilityNode::new(cfg),
            ctx,
            inbox_rx,
            status_tx,
            cancel.clone(),
        )),
        NodeDefinition::Publish(cfg) => tokio::spawn(run_operation(
            PublishNode::new(cfg),
            ctx,
            inbox_rx,
            status_tx,
            cancel.clone(),
        )),
        NodeDefinition::Function(cfg) => tokio::spawn(run_operation(
            FunctionNode::new(cfg),
            ctx,
            inbox_rx,
            status_tx,
            cancel.clone(),
        )),
        NodeDefinition::Variable(cfg) => tokio::spawn(run_operation(
            VariableNode::new(cfg),
            ctx,
            inbox_rx,
            status_tx,
            cancel.clone(),
        )),
        NodeDefinition::Events(cfg) => {
            let session = StreamSession::new(cfg, ctx, status_tx);
            tokio::spawn(session.run(inbox_rx, cancel.clone()))
        }
    };

    tracing::debug!(node_id = %id, kind, "node spawned");

    NodeHandle {
        id,
        kind,
        inbox: inbox_tx,
        status: status_rx,
        cancel,
        task,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operation actor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Actor loop shared by utility, publish, function and variable nodes.
pub async fn run_operation<N: OperationNode>(
    mut node: N,
    ctx: NodeContext,
    mut inbox: mpsc::Receiver<Message>,
    status: watch::Sender<NodeStatus>,
    cancel: CancellationToken,
) {
    let mut throttle = InvocationThrottle::new(ctx.timing.debounce(), node.repeat_secs());

    // Checked once: a node without a token stays degraded until redeployed.
    let configured = ctx.connection.has_token();
    if configured {
        status.send_replace(node.startup_status().unwrap_or_default());
    } else {
        tracing::error!(node_id = %node.id(), "no access token in cloud configuration");
        status.send_replace(NodeStatus::error(NO_TOKEN_TEXT));
    }

    if node.once() {
        throttle.trigger(Instant::now());
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = inbox.recv() => {
                let Some(message) = received else { break };
                let applied = node.apply(message);
                if configured {
                    if let Some(s) = applied.status {
                        status.send_replace(s);
                    }
                }
                let now = Instant::now();
                match applied.effect {
                    Effect::Invoke => throttle.trigger(now),
                    Effect::Repeat(secs) => {
                        tracing::debug!(node_id = %node.id(), repeat_secs = secs, "repeat changed");
                        throttle.set_repeat(secs, now);
                    }
                    Effect::Updated | Effect::Ignored => {}
                }
            }
            _ = sleep_until_opt(throttle.debounce_deadline()) => {
                if throttle.fire(Instant::now()) {
                    dispatch(&node, &ctx, configured);
                }
            }
            _ = sleep_until_opt(throttle.next_tick()) => {
                if throttle.tick(Instant::now()) {
                    dispatch(&node, &ctx, configured);
                }
            }
        }
    }

    throttle.cancel();
    TraceEvent::NodeClosed {
        node_id: node.id().to_owned(),
        kind: node.kind().to_owned(),
    }
    .emit();
}

/// Build the request now and run the call on its own task.
fn dispatch<N: OperationNode>(node: &N, ctx: &NodeContext, configured: bool) {
    if !configured {
        tracing::warn!(node_id = %node.id(), "call refused: no access token");
        return;
    }

    let request = match node.build_request() {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(node_id = %node.id(), error = %e, "invocation aborted");
            return;
        }
    };

    let node_id = node.id().to_owned();
    let connection = ctx.connection.clone();
    let outbound = ctx.outbound.clone();
    tokio::spawn(async move {
        match invoke(&connection, &node_id, &request).await {
            Ok(message) => {
                let out = Outbound {
                    node: node_id,
                    message,
                };
                if outbound.send(out).await.is_err() {
                    tracing::debug!("outbound channel closed, result dropped");
                }
            }
            Err(e) => {
                tracing::error!(
                    node_id = %node_id,
                    operation = request.kind().as_str(),
                    status = ?e.status,
                    body = %e.body,
                    "{}",
                    e.message
                );
            }
        }
    });
}

/// Sleep until `deadline`, or forever when there is none.
pub(crate) fn sleep_until_opt(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(d) => tokio::time::sleep_until(d).await,
            None => std::future::pending().await,
        }
    }
}

/// Truncate a configured or inbound value and log when it was cut.
pub(crate) fn truncate_field(node_id: &str, field: &str, value: &mut String, limit: usize) {
    let original_chars = value.chars().count();
    if pf_domain::limits::truncate_chars(value, limit) {
        tracing::warn!(node_id = %node_id, field, limit, "{field} longer than {limit} chars, truncating");
        TraceEvent::FieldTruncated {
            node_id: node_id.to_owned(),
            field: field.to_owned(),
            original_chars,
            limit,
        }
        .emit();
    }
}
