//! `pf-node-sdk` -- flow nodes for the Particle device cloud.
//!
//! A node is a small actor that reacts to inbound flow messages by calling
//! the device cloud. Five kinds exist: utility, publish, function,
//! variable and events. This crate provides the nodes and the machinery
//! they share so hosts only need to route messages and read results.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Host (particle-flow runner, tests, embedding app)         │
//! │                                                            │
//! │   let flow = FlowRegistry::from_config(&cfg, conn, tx)?;   │
//! │   flow.deliver("led", Message::new("on")).await?;          │
//! │   rx.recv().await   // Outbound { node, message }          │
//! │   flow.close_all().await;                                  │
//! └────────────────────────────────────────────────────────────┘
//!           │ inbox (mpsc)        ▲ outbound (mpsc), status (watch)
//!           ▼                     │
//!   ┌────────────────────┐  ┌────────────────────┐
//!   │ operation actor    │  │ StreamSession      │
//!   │ InvocationThrottle │  │ reader task        │
//!   └─────────┬──────────┘  └─────────┬──────────┘
//!             └──── Arc<CloudConnection> ───┘
//! ```
//!
//! # Message conventions
//!
//! - `topic` selects the configuration field a message updates (`devid`,
//!   `fname`, `getvar`, `evtname`, `param`, `repeat`, ...)
//! - a payload with no topic is a shortcut call
//! - bursts are debounced (5 ms) into a single remote call

pub mod nodes;
pub mod registry;
pub mod session;
pub mod status;
pub mod throttle;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use nodes::{spawn_node, NodeHandle};
pub use registry::FlowRegistry;
pub use session::{StreamSession, StreamState};
pub use status::{NodeStatus, StatusLevel, StatusShape};
pub use throttle::{InvocationThrottle, ThrottleState};
pub use types::{NodeContext, NodeSdkError, Outbound, RequestError};

// Re-export the message type so hosts never need pf-domain for routing.
pub use pf_domain::message::Message;
