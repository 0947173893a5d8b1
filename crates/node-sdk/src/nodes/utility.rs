//! Device-management node: list, get, signal, rename, claim, add to product.
//!
//! Every inbound message executes the configured utility. `devid` and
//! `productIdOrSlug` topics update the configuration first. The payload of
//! the triggering message is the utility's argument: the new name for a
//! rename, the on/off flag for a signal, the product for add-to-product.

use pf_cloud::{DeviceRef, OperationKind, OperationRequest};
use pf_domain::config::{UtilityKind, UtilityNodeConfig};
use pf_domain::field::resolve_text;
use pf_domain::message::{is_truthy, value_to_text, Message};

use super::{Applied, Effect, OperationNode};
use crate::types::RequestError;

pub struct UtilityNode {
    cfg: UtilityNodeConfig,
    last: Message,
}

impl UtilityNode {
    pub fn new(cfg: UtilityNodeConfig) -> Self {
        Self {
            cfg,
            last: Message::default(),
        }
    }

    fn product(&self) -> Option<String> {
        self.cfg
            .product_id_or_slug
            .clone()
            .filter(|p| !p.trim().is_empty())
    }

    fn device_id(&self) -> Result<String, RequestError> {
        let id = resolve_text(&self.cfg.devid, &self.last)?;
        if id.trim().is_empty() {
            return Err(RequestError::Missing("devid"));
        }
        Ok(id)
    }

    fn device(&self) -> Result<DeviceRef, RequestError> {
        Ok(DeviceRef {
            device_id: self.device_id()?,
            product: self.product(),
        })
    }
}

impl OperationNode for UtilityNode {
    fn id(&self) -> &str {
        &self.cfg.id
    }

    fn kind(&self) -> &'static str {
        "utility"
    }

    fn apply(&mut self, message: Message) -> Applied {
        match message.topic() {
            Some("devid") => {
                if message.has_payload() {
                    self.cfg.devid = value_to_text(&message.payload);
                    tracing::trace!(node_id = %self.cfg.id, devid = %self.cfg.devid, "new device id");
                } else {
                    tracing::warn!(node_id = %self.cfg.id, "ignored invalid new devid");
                }
            }
            Some("productIdOrSlug") => {
                if message.has_payload() {
                    self.cfg.product_id_or_slug = Some(value_to_text(&message.payload));
                } else {
                    tracing::warn!(node_id = %self.cfg.id, "ignored invalid new productIdOrSlug");
                }
            }
            _ => {}
        }

        tracing::trace!(
            node_id = %self.cfg.id,
            utility = OperationKind::from(self.cfg.utility).as_str(),
            "utility triggered"
        );
        self.last = message;
        Applied::new(Effect::Invoke, None)
    }

    fn build_request(&self) -> Result<OperationRequest, RequestError> {
        let payload = &self.last.payload;
        Ok(match self.cfg.utility {
            UtilityKind::ListDevices => OperationRequest::ListDevices {
                product: self.product(),
            },
            UtilityKind::GetDevice => OperationRequest::GetDevice {
                device: self.device()?,
            },
            UtilityKind::SignalDevice => OperationRequest::SignalDevice {
                device: self.device()?,
                signal: is_truthy(payload),
            },
            UtilityKind::NameDevice => OperationRequest::RenameDevice {
                device: self.device()?,
                name: value_to_text(payload),
            },
            UtilityKind::ClaimDevice => OperationRequest::ClaimDevice {
                device_id: self.device_id()?,
            },
            UtilityKind::AddDeviceToProduct => {
                // A configured product wins over the payload.
                let product = self
                    .product()
                    .or_else(|| Some(value_to_text(payload)).filter(|p| !p.is_empty()))
                    .ok_or(RequestError::Missing("productIdOrSlug"))?;
                OperationRequest::AddDeviceToProduct {
                    device_id: self.device_id()?,
                    product,
                }
            }
        })
    }
}
