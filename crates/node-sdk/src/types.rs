//! Core types shared by every node: context, outbound envelope and errors.

use std::sync::Arc;

use pf_cloud::CloudConnection;
use pf_domain::config::TimingConfig;
use pf_domain::field::ResolutionError;
use pf_domain::message::Message;
use serde::Serialize;
use tokio::sync::mpsc;

/// Everything a node needs from its host, handed over at spawn time.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Shared read-only connection; never cloned per node.
    pub connection: Arc<CloudConnection>,
    pub timing: TimingConfig,
    /// Where successful results and stream events are sent.
    pub outbound: mpsc::Sender<Outbound>,
}

/// An outbound message tagged with the node that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outbound {
    pub node: String,
    #[serde(flatten)]
    pub message: Message,
}

/// Why an operation node could not build a request from its current state.
///
/// Aborts only the pending invocation; the node stays usable.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("{0} is not set")]
    Missing(&'static str),
}

/// Top-level SDK error.
#[derive(thiserror::Error, Debug)]
pub enum NodeSdkError {
    #[error("config: {0}")]
    Config(String),
    #[error("unknown node {0:?}")]
    UnknownNode(String),
    #[error("node {0:?} is closed")]
    Closed(String),
    #[error("node task failed: {0}")]
    Join(String),
}
