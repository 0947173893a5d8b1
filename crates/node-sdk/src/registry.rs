//! Flow registry: maps node ids to running nodes.

use std::collections::HashMap;
use std::sync::Arc;

use pf_cloud::CloudConnection;
use pf_domain::config::{Config, NodeDefinition};
use pf_domain::message::Message;
use tokio::sync::{mpsc, watch};

use crate::nodes::{spawn_node, NodeHandle};
use crate::status::NodeStatus;
use crate::types::{NodeContext, NodeSdkError, Outbound};

/// The set of running nodes of one flow, in declaration order.
///
/// # Usage
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use pf_cloud::CloudConnection;
/// # use pf_domain::config::Config;
/// # use pf_node_sdk::FlowRegistry;
/// # async fn demo(config: Config, connection: Arc<CloudConnection>) -> Result<(), Box<dyn std::error::Error>> {
/// let (tx, mut rx) = tokio::sync::mpsc::channel(256);
/// let flow = FlowRegistry::from_config(&config, connection, tx)?;
/// flow.deliver("led", pf_domain::message::Message::new("on")).await?;
/// while let Some(out) = rx.recv().await {
///     println!("{}: {:?}", out.node, out.message.payload);
/// }
/// flow.close_all().await;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct FlowRegistry {
    nodes: HashMap<String, NodeHandle>,
    order: Vec<String>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn every node of `config`, sharing one connection and one
    /// outbound channel.
    pub fn from_config(
        config: &Config,
        connection: Arc<CloudConnection>,
        outbound: mpsc::Sender<Outbound>,
    ) -> Result<Self, NodeSdkError> {
        let ctx = NodeContext {
            connection,
            timing: config.timing.clone(),
            outbound,
        };
        let mut registry = Self::new();
        for definition in &config.nodes {
            registry.spawn(definition.clone(), ctx.clone())?;
        }
        tracing::info!(nodes = registry.len(), "flow started");
        Ok(registry)
    }

    /// Spawn one node. Ids must be unique and non-empty.
    pub fn spawn(
        &mut self,
        definition: NodeDefinition,
        ctx: NodeContext,
    ) -> Result<&NodeHandle, NodeSdkError> {
        let id = definition.id().to_owned();
        if id.trim().is_empty() {
            return Err(NodeSdkError::Config("node id must not be empty".into()));
        }
        if self.nodes.contains_key(&id) {
            return Err(NodeSdkError::Config(format!("duplicate node id {id:?}")));
        }
        let handle = spawn_node(definition, ctx);
        self.order.push(id.clone());
        Ok(self.nodes.entry(id).or_insert(handle))
    }

    pub fn get(&self, id: &str) -> Option<&NodeHandle> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Route an inbound message to the node named `id`.
    pub async fn deliver(&self, id: &str, message: Message) -> Result<(), NodeSdkError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| NodeSdkError::UnknownNode(id.to_owned()))?;
        node.send(message).await
    }

    /// Status receivers for every node, in declaration order.
    pub fn status_watchers(&self) -> Vec<(String, watch::Receiver<NodeStatus>)> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| (id.clone(), n.watch_status())))
            .collect()
    }

    /// Close every node, continuing past failures.
    pub async fn close_all(mut self) {
        for id in self.order.drain(..) {
            let Some(node) = self.nodes.remove(&id) else {
                continue;
            };
            if let Err(e) = node.close().await {
                tracing::warn!(node_id = %id, error = %e, "node did not close cleanly");
            }
        }
        tracing::info!("flow closed");
    }
}
