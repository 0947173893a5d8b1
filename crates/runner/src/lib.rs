//! `pf-runner` -- the `particle-flow` binary.
//!
//! Loads a flow file, spawns its nodes and pumps JSON lines:
//!
//! ```text
//!   stdin ──▶ flow::run ──deliver──▶ FlowRegistry ──▶ nodes
//!                 │                                     │
//!   stdout ◀──────┴───────────── outbound ◀─────────────┘
//!   stderr ◀── tracing (status changes, remote calls, stream events)
//! ```

pub mod cli;
pub mod flow;
