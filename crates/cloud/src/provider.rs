//! The `DeviceCloud` trait defines the remote API surface consumed by flow
//! nodes (REST client, mock/test).

use async_trait::async_trait;
use pf_domain::error::Result;
use pf_domain::stream::BoxStream;

use crate::types::{
    CloudEvent, CloudResponse, DeviceCall, DeviceRef, DeviceUpdate, PublishParams, StreamFilter,
};

/// Live event feed. An `Err` item is a transport error; the feed may keep
/// yielding afterwards. The stream ending (`None`) means the remote closed
/// the connection.
pub type EventStream = BoxStream<'static, Result<CloudEvent>>;

/// Abstraction over the Particle cloud API.
///
/// Every request method returns `Ok` for any HTTP status the server answers
/// with; interpreting the status is the caller's job. `Err` means the
/// request never produced a response (connect failure, timeout, ...).
/// `auth` is the bearer token.
#[async_trait]
pub trait DeviceCloud: Send + Sync {
    /// List devices (GET /v1/devices or /v1/products/{p}/devices).
    async fn list_devices(&self, auth: &str, product: Option<&str>) -> Result<CloudResponse>;

    /// Device details (GET /v1/devices/{id}).
    async fn get_device(&self, auth: &str, device: &DeviceRef) -> Result<CloudResponse>;

    /// Rename or signal a device (PUT /v1/devices/{id}).
    async fn update_device(
        &self,
        auth: &str,
        device: &DeviceRef,
        update: &DeviceUpdate,
    ) -> Result<CloudResponse>;

    /// Claim a device for the token's account (POST /v1/devices).
    async fn claim_device(&self, auth: &str, device_id: &str) -> Result<CloudResponse>;

    /// Add a device to a product (POST /v1/products/{p}/devices).
    async fn add_device_to_product(
        &self,
        auth: &str,
        device_id: &str,
        product: &str,
    ) -> Result<CloudResponse>;

    /// Read a cloud variable (GET /v1/devices/{id}/{name}).
    async fn get_variable(&self, auth: &str, call: &DeviceCall) -> Result<CloudResponse>;

    /// Call a cloud function (POST /v1/devices/{id}/{name}).
    async fn call_function(&self, auth: &str, call: &DeviceCall) -> Result<CloudResponse>;

    /// Publish an event (POST /v1/devices/events).
    async fn publish_event(&self, auth: &str, params: &PublishParams) -> Result<CloudResponse>;

    /// Open an event stream. Resolves once the server accepted the
    /// subscription; a refused subscription is an `Err`.
    async fn event_stream(&self, auth: &str, filter: &StreamFilter) -> Result<EventStream>;
}
