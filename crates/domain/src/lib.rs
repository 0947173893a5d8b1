//! `pf-domain` -- shared types for the particle-flow crates.
//!
//! Holds the pieces every other crate needs and that carry no I/O:
//! configuration, the inbound/outbound [`Message`](message::Message)
//! shape, the `{path}` field resolver, truncation limits, the shared error
//! type and structured trace events.

pub mod config;
pub mod error;
pub mod field;
pub mod limits;
pub mod message;
pub mod stream;
pub mod trace;
