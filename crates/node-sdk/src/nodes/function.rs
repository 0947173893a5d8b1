//! Cloud function node.
//!
//! Topics: `devid`, `fname`, `param` (new argument, calls), `repeat`. A
//! payload without a topic calls the function with that payload.
//!
//! The argument sent is, in order: the `param` spec resolved against the
//! last triggering message when it is a `{path}`, else the last payload,
//! else the literal `param`.

use pf_cloud::{DeviceCall, DeviceRef, OperationRequest};
use pf_domain::config::FunctionNodeConfig;
use pf_domain::field::{resolve_text, FieldSpec};
use pf_domain::limits::{MAX_DATA_CHARS, MAX_NAME_CHARS};
use pf_domain::message::{value_to_f64, value_to_text, Message};

use super::{truncate_field, Applied, Effect, OperationNode};
use crate::status::NodeStatus;
use crate::types::RequestError;

pub struct FunctionNode {
    cfg: FunctionNodeConfig,
    last: Message,
}

impl FunctionNode {
    pub fn new(mut cfg: FunctionNodeConfig) -> Self {
        truncate_field(&cfg.id, "fname", &mut cfg.fname, MAX_NAME_CHARS);
        Self {
            cfg,
            last: Message::default(),
        }
    }

    fn argument(&self) -> Result<String, RequestError> {
        let mut argument = match FieldSpec::parse(&self.cfg.param)? {
            spec @ FieldSpec::Path(_) => value_to_text(&spec.resolve(&self.last)?),
            FieldSpec::Literal(literal) if self.last.payload.is_null() => literal,
            FieldSpec::Literal(_) => value_to_text(&self.last.payload),
        };
        truncate_field(&self.cfg.id, "argument", &mut argument, MAX_DATA_CHARS);
        Ok(argument)
    }
}

impl OperationNode for FunctionNode {
    fn id(&self) -> &str {
        &self.cfg.id
    }

    fn kind(&self) -> &'static str {
        "function"
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
                Applied::new(Effect::Updated, Some(NodeStatus::changed("devid", text)))
            }
            Some("fname") => {
                self.cfg.fname = text.clone();
                truncate_field(&self.cfg.id, "fname", &mut self.cfg.fname, MAX_NAME_CHARS);
                Applied::new(Effect::Updated, Some(NodeStatus::changed("fname", text)))
            }
            Some("param") => {
                self.cfg.param = text.clone();
                truncate_field(&self.cfg.id, "param", &mut self.cfg.param, MAX_DATA_CHARS);
                self.last = message;
                Applied::new(Effect::Invoke, Some(NodeStatus::info(text)))
            }
            Some("repeat") => {
                let secs = value_to_f64(&message.payload).unwrap_or(0.0);
                self.cfg.repeat = secs;
                Applied::new(Effect::Repeat(secs), Some(NodeStatus::changed("repeat", text)))
            }
            None if message.has_payload() => {
                self.last = message;
                Applied::new(Effect::Invoke, Some(NodeStatus::info(text)))
            }
            _ => Applied::ignored(),
        }
    }

    fn build_request(&self) -> Result<OperationRequest, RequestError> {
        if self.cfg.fname.trim().is_empty() {
            return Err(RequestError::Missing("fname"));
        }
        let device_id = resolve_text(&self.cfg.devid, &self.last)?;
        if device_id.trim().is_empty() {
            return Err(RequestError::Missing("devid"));
        }
        Ok(OperationRequest::CallFunction(DeviceCall {
            device: DeviceRef {
                device_id,
                product: self
                    .cfg
                    .product_id_or_slug
                    .clone()
                    .filter(|p| !p.trim().is_empty()),
            },
            name: self.cfg.fname.clone(),
            argument: Some(self.argument()?),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_domain::field::ResolutionError;
    use serde_json::json;

    fn node(devid: &str, param: &str) -> FunctionNode {
        FunctionNode::new(FunctionNodeConfig {
            id: "f".into(),
            devid: devid.into(),
            fname: "led".into(),
            param: param.into(),
            product_id_or_slug: None,
            repeat: 0.0,
            once: false,
        })
    }

    fn call(n: &FunctionNode) -> DeviceCall {
        match n.build_request().unwrap() {
            OperationRequest::CallFunction(c) => c,
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn literal_param_used_before_any_trigger() {
        let n = node("abc", "on");
        assert_eq!(call(&n).argument.as_deref(), Some("on"));
    }

    #[test]
    fn shortcut_payload_becomes_argument() {
        let mut n = node("abc", "on");
        let applied = n.apply(Message::new("42"));
        assert_eq!(applied.effect, Effect::Invoke);
        assert_eq!(call(&n).argument.as_deref(), Some("42"));
    }

    #[test]
    fn param_topic_sets_argument_and_invokes() {
        let mut n = node("abc", "");
        let applied = n.apply(Message::with_topic("param", "off"));
        assert_eq!(applied.effect, Effect::Invoke);
        assert_eq!(call(&n).argument.as_deref(), Some("off"));
    }

    #[test]
    fn path_param_resolves_against_last_message() {
        let mut n = node("{payload.device}", "{payload.level}");
        n.apply(Message::new(json!({"device": "dev9", "level": 7})));
        let c = call(&n);
        assert_eq!(c.device.device_id, "dev9");
        assert_eq!(c.argument.as_deref(), Some("7"));
    }

    #[test]
    fn missing_path_aborts_invocation() {
        let mut n = node("abc", "{payload.level}");
        n.apply(Message::new(json!({"other": 1})));
        assert!(matches!(
            n.build_request().unwrap_err(),
            RequestError::Resolution(ResolutionError::Missing(_))
        ));
    }

    #[test]
    fn config_topics_do_not_invoke() {
        let mut n = node("abc", "");
        let applied = n.apply(Message::with_topic("fname", "f".repeat(70)));
        assert_eq!(applied.effect, Effect::Updated);
        assert_eq!(call(&n).name.chars().count(), 64);
        assert_eq!(n.apply(Message::with_topic("devid", "xyz")).effect, Effect::Updated);
        assert_eq!(call(&n).device.device_id, "xyz");
        assert_eq!(
            n.apply(Message::with_topic("repeat", 2)).effect,
            Effect::Repeat(2.0)
        );
    }

    #[test]
    fn long_argument_truncated() {
        let mut n = node("abc", "");
        n.apply(Message::new("a".repeat(700)));
        assert_eq!(call(&n).argument.unwrap().chars().count(), 622);
    }

    #[test]
    fn missing_device_reports_startup_status() {
        let n = node("", "");
        assert_eq!(n.startup_status().unwrap().text(), "No Device ID");
        assert_eq!(n.build_request().unwrap_err(), RequestError::Missing("devid"));
    }
}
