//! Remote operation invoker.
//!
//! Maps one [`OperationRequest`] to exactly one [`DeviceCloud`] call,
//! checks the status and projects the response body into the outbound
//! message shape of the node kind that asked for it. No retries.

use std::time::Instant;

use pf_domain::config::UtilityKind;
use pf_domain::error::Error;
use pf_domain::message::Message;
use pf_domain::trace::TraceEvent;
use serde_json::Value;

use crate::connection::CloudConnection;
use crate::provider::DeviceCloud;
use crate::rest::error_message;
use crate::types::{CloudResponse, DeviceCall, DeviceRef, DeviceUpdate, PublishParams};

/// The nine remote operations a node can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ListDevices,
    GetDevice,
    SignalDevice,
    RenameDevice,
    ClaimDevice,
    AddDeviceToProduct,
    GetVariable,
    CallFunction,
    PublishEvent,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListDevices => "list_devices",
            Self::GetDevice => "get_device",
            Self::SignalDevice => "signal_device",
            Self::RenameDevice => "rename_device",
            Self::ClaimDevice => "claim_device",
            Self::AddDeviceToProduct => "add_device_to_product",
            Self::GetVariable => "get_variable",
            Self::CallFunction => "call_function",
            Self::PublishEvent => "publish_event",
        }
    }
}

impl From<UtilityKind> for OperationKind {
    fn from(kind: UtilityKind) -> Self {
        match kind {
            UtilityKind::ListDevices => Self::ListDevices,
            UtilityKind::GetDevice => Self::GetDevice,
            UtilityKind::SignalDevice => Self::SignalDevice,
            UtilityKind::NameDevice => Self::RenameDevice,
            UtilityKind::ClaimDevice => Self::ClaimDevice,
            UtilityKind::AddDeviceToProduct => Self::AddDeviceToProduct,
        }
    }
}

/// A fully resolved request, built fresh for every invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    ListDevices {
        product: Option<String>,
    },
    GetDevice {
        device: DeviceRef,
    },
    SignalDevice {
        device: DeviceRef,
        signal: bool,
    },
    RenameDevice {
        device: DeviceRef,
        name: String,
    },
    ClaimDevice {
        device_id: String,
    },
    AddDeviceToProduct {
        device_id: String,
        product: String,
    },
    GetVariable(DeviceCall),
    CallFunction(DeviceCall),
    PublishEvent(PublishParams),
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::ListDevices { .. } => OperationKind::ListDevices,
            Self::GetDevice { .. } => OperationKind::GetDevice,
            Self::SignalDevice { .. } => OperationKind::SignalDevice,
            Self::RenameDevice { .. } => OperationKind::RenameDevice,
            Self::ClaimDevice { .. } => OperationKind::ClaimDevice,
            Self::AddDeviceToProduct { .. } => OperationKind::AddDeviceToProduct,
            Self::GetVariable(_) => OperationKind::GetVariable,
            Self::CallFunction(_) => OperationKind::CallFunction,
            Self::PublishEvent(_) => OperationKind::PublishEvent,
        }
    }
}

/// A failed remote call: either a non-200 answer or no answer at all.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RemoteError {
    /// `None` when the request never got a response.
    pub status: Option<u16>,
    pub message: String,
    pub body: Value,
}

impl From<Error> for RemoteError {
    fn from(e: Error) -> Self {
        match e {
            Error::Remote {
                status,
                message,
                body,
            } => Self {
                status: Some(status),
                message,
                body,
            },
            other => Self {
                status: None,
                message: other.to_string(),
                body: Value::Null,
            },
        }
    }
}

/// Perform one remote call for `node_id` and project the result.
pub async fn invoke(
    connection: &CloudConnection,
    node_id: &str,
    request: &OperationRequest,
) -> Result<Message, RemoteError> {
    let kind = request.kind();
    let Some(auth) = connection.token() else {
        return Err(RemoteError {
            status: None,
            message: "no access token configured".into(),
            body: Value::Null,
        });
    };

    let start = Instant::now();
    let result = dispatch(connection.api(), auth, request).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let response = match result {
        Ok(r) => r,
        Err(e) => {
            TraceEvent::RemoteCall {
                node_id: node_id.to_owned(),
                operation: kind.as_str().to_owned(),
                status: 0,
                duration_ms,
            }
            .emit();
            return Err(e.into());
        }
    };

    TraceEvent::RemoteCall {
        node_id: node_id.to_owned(),
        operation: kind.as_str().to_owned(),
        status: response.status_code,
        duration_ms,
    }
    .emit();

    if response.status_code != 200 {
        return Err(RemoteError {
            status: Some(response.status_code),
            message: error_message(&response.body, response.status_code),
            body: response.body,
        });
    }

    Ok(project(kind, response))
}

async fn dispatch(
    api: &dyn DeviceCloud,
    auth: &str,
    request: &OperationRequest,
) -> pf_domain::error::Result<CloudResponse> {
    match request {
        OperationRequest::ListDevices { product } => api.list_devices(auth, product.as_deref()).await,
        OperationRequest::GetDevice { device } => api.get_device(auth, device).await,
        OperationRequest::SignalDevice { device, signal } => {
            api.update_device(auth, device, &DeviceUpdate::Signal(*signal))
                .await
        }
        OperationRequest::RenameDevice { device, name } => {
            api.update_device(auth, device, &DeviceUpdate::Rename(name.clone()))
                .await
        }
        OperationRequest::ClaimDevice { device_id } => api.claim_device(auth, device_id).await,
        OperationRequest::AddDeviceToProduct { device_id, product } => {
            api.add_device_to_product(auth, device_id, product).await
        }
        OperationRequest::GetVariable(call) => api.get_variable(auth, call).await,
        OperationRequest::CallFunction(call) => api.call_function(auth, call).await,
        OperationRequest::PublishEvent(params) => api.publish_event(auth, params).await,
    }
}

/// Shape a successful response into the outbound message for `kind`.
///
/// | kind          | payload               | extra fields                        |
/// |---------------|-----------------------|-------------------------------------|
/// | utility kinds | body                  | `statusCode`                        |
/// | call function | `body.return_value`   | `raw`, `id`                         |
/// | get variable  | `body.result`         | `raw`, `id` (`body.coreInfo.deviceID`) |
/// | publish event | `true`                |                                     |
pub fn project(kind: OperationKind, response: CloudResponse) -> Message {
    let body = response.body;
    match kind {
        OperationKind::CallFunction => {
            let payload = body.get("return_value").cloned().unwrap_or(Value::Null);
            let id = body.get("id").cloned().unwrap_or(Value::Null);
            Message::new(payload).with_field("raw", body).with_field("id", id)
        }
        OperationKind::GetVariable => {
            let payload = body.get("result").cloned().unwrap_or(Value::Null);
            let id = body
                .pointer("/coreInfo/deviceID")
                .cloned()
                .unwrap_or(Value::Null);
            Message::new(payload).with_field("raw", body).with_field("id", id)
        }
        OperationKind::PublishEvent => Message::new(true),
        _ => Message::new(body).with_field("statusCode", response.status_code),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
