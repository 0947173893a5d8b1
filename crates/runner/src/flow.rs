//! The flow loop: stdin lines in, outbound messages out.
//!
//! Each input line is a JSON object `{"node": "<id>", "topic": ..., "payload":
//! ..., ...}`; everything but `node` becomes the delivered message. Outbound
//! messages are written as one JSON object per line with the producing
//! node's id under `node`. Bad lines are logged and skipped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pf_cloud::CloudConnection;
use pf_domain::config::Config;
use pf_node_sdk::{FlowRegistry, Message, NodeStatus, Outbound};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

const OUTBOUND_CAPACITY: usize = 256;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundLine {
    pub node: String,
    #[serde(flatten)]
    pub message: Message,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<InboundLine>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let parsed = serde_json::from_str(line).context("invalid input line")?;
    Ok(Some(parsed))
}

/// Encode one outbound message as a JSON line (newline included).
pub fn encode_outbound(out: &Outbound) -> anyhow::Result<String> {
    let mut line = serde_json::to_string(out).context("encoding outbound message")?;
    line.push('\n');
    Ok(line)
}

/// Run the flow described by `config` until `input` is exhausted (plus
/// `linger`) or `shutdown` resolves, then close every node and flush the
/// results of calls already in flight.
pub async fn run<R, W, S>(
    config: &Config,
    connection: Arc<CloudConnection>,
    input: R,
    output: &mut W,
    shutdown: S,
    linger: Duration,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let flow = FlowRegistry::from_config(config, connection, tx)?;
    for (id, status) in flow.status_watchers() {
        tokio::spawn(log_status_changes(id, status));
    }

    let mut lines = input.lines();
    let mut input_open = true;
    let linger_done = tokio::time::sleep(Duration::MAX);
    tokio::pin!(linger_done);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
            () = &mut linger_done, if !input_open => break,
            line = lines.next_line(), if input_open => {
                match line.context("reading input")? {
                    Some(line) => deliver(&flow, &line).await,
                    None => {
                        tracing::info!(linger_ms = linger.as_millis() as u64, "input closed");
                        input_open = false;
                        linger_done
                            .as_mut()
                            .reset(tokio::time::Instant::now() + linger);
                    }
                }
            }
            Some(out) = rx.recv() => {
                write_outbound(output, &out).await?;
            }
        }
    }

    flow.close_all().await;

    // Calls already sent still hold a sender and finish on their own.
    while let Some(out) = rx.recv().await {
        write_outbound(output, &out).await?;
    }
    output.flush().await.context("flushing output")?;
    Ok(())
}

async fn deliver(flow: &FlowRegistry, line: &str) {
    let inbound = match parse_line(line) {
        Ok(Some(inbound)) => inbound,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "skipping input line");
            return;
        }
    };
    if let Err(e) = flow.deliver(&inbound.node, inbound.message).await {
        tracing::warn!(node_id = %inbound.node, error = %e, "message not delivered");
    }
}

async fn write_outbound<W: AsyncWrite + Unpin>(output: &mut W, out: &Outbound) -> anyhow::Result<()> {
    let line = encode_outbound(out)?;
    output
        .write_all(line.as_bytes())
        .await
        .context("writing output")?;
    output.flush().await.context("flushing output")
}

async fn log_status_changes(node_id: String, mut status: watch::Receiver<NodeStatus>) {
    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().clone();
        match current.level() {
            Some(level) => tracing::info!(node_id = %node_id, ?level, status = %current, "node status"),
            None => tracing::debug!(node_id = %node_id, "node status cleared"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
