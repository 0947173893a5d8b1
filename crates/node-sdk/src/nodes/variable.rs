//! Cloud variable node.
//!
//! Topics `devid`, `getvar` and `repeat` update the configuration. Any
//! other message, even an empty one, reads the variable.

use pf_cloud::{DeviceCall, DeviceRef, OperationRequest};
use pf_domain::config::VariableNodeConfig;
use pf_domain::field::resolve_text;
use pf_domain::limits::MAX_NAME_CHARS;
use pf_domain::message::{value_to_f64, value_to_text, Message};

use super::{truncate_field, Applied, Effect, OperationNode};
use crate::status::{NodeStatus, StatusLevel, StatusShape};
use crate::types::RequestError;

pub struct VariableNode {
    cfg: VariableNodeConfig,
    last: Message,
}

impl VariableNode {
    pub fn new(mut cfg: VariableNodeConfig) -> Self {
        truncate_field(&cfg.id, "getvar", &mut cfg.getvar, MAX_NAME_CHARS);
        Self {
            cfg,
            last: Message::default(),
        }
    }
}

fn modified(topic: &str, text: &str) -> Option<NodeStatus> {
    Some(NodeStatus::shown(
        StatusLevel::Success,
        StatusShape::Ring,
        format!("{topic} modified to {text}"),
    ))
}

impl OperationNode for VariableNode {
    fn id(&self) -> &str {
        &self.cfg.id
    }

    fn kind(&self) -> &'static str {
        "variable"
    }

    fn repeat_secs(&self) -> f64 {
        self.cfg.repeat
    }

    fn once(&self) -> bool {
        self.cfg.once
    }

    fn startup_status(&self) -> Option<NodeStatus> {
        if self.cfg.devid.trim().is_empty() {
            tracing::error!(node_id = %self.cfg.id, "no device id set");
            Some(NodeStatus::info("No Device ID"))
        } else {
            None
        }
    }

    fn apply(&mut self, message: Message) -> Applied {
        let text = value_to_text(&message.payload);
        match message.topic() {
            Some("devid") => {
                self.cfg.devid = text.clone();
                Applied::new(Effect::Updated, modified("devid", &text))
            }
            Some("getvar") => {
                self.cfg.getvar = text.clone();
                truncate_field(&self.cfg.id, "getvar", &mut self.cfg.getvar, MAX_NAME_CHARS);
                Applied::new(Effect::Updated, modified("getvar", &text))
            }
            Some("repeat") => {
                let secs = value_to_f64(&message.payload).unwrap_or(0.0);
                self.cfg.repeat = secs;
                Applied::new(Effect::Repeat(secs), modified("repeat", &text))
            }
            _ => {
                self.last = message;
                Applied::new(Effect::Invoke, None)
            }
        }
    }

    fn build_request(&self) -> Result<OperationRequest, RequestError> {
        if self.cfg.getvar.trim().is_empty() {
            return Err(RequestError::Missing("getvar"));
        }
        let device_id = resolve_text(&self.cfg.devid, &self.last)?;
        if device_id.trim().is_empty() {
            return Err(RequestError::Missing("devid"));
        }
        Ok(OperationRequest::GetVariable(DeviceCall {
            device: DeviceRef {
                device_id,
                product: self
                    .cfg
                    .product_id_or_slug
                    .clone()
                    .filter(|p| !p.trim().is_empty()),
            },
            name: self.cfg.getvar.clone(),
            argument: None,
        }))
    }
}
