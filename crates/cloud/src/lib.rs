//! Particle device-cloud client.
//!
//! - [`provider::DeviceCloud`] -- the remote API surface nodes depend on
//! - [`rest::ParticleRestClient`] -- reqwest implementation of it
//! - [`connection::CloudConnection`] -- shared host/token/client bundle
//! - [`invoker::invoke`] -- one operation, status check, result projection

pub mod connection;
pub mod invoker;
pub mod provider;
pub mod rest;
mod sse;
pub mod types;

pub use connection::CloudConnection;
pub use invoker::{invoke, OperationKind, OperationRequest, RemoteError};
pub use provider::{DeviceCloud, EventStream};
pub use rest::ParticleRestClient;
pub use types::*;
