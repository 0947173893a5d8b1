//! Event publishing node.
//!
//! Topics: `evtname` (rename, no publish), `param` (new data, publishes),
//! `private`, `ttl`, `repeat`. With `evtnametopic` any other topic is the
//! event name and the payload its data. A payload without a topic publishes
//! it as data.

use pf_cloud::{OperationRequest, PublishParams};
use pf_domain::config::PublishNodeConfig;
use pf_domain::limits::{FALLBACK_EVENT_NAME, MAX_DATA_CHARS, MAX_NAME_CHARS};
use pf_domain::message::{is_truthy, value_to_f64, value_to_text, Message};

use super::{truncate_field, Applied, Effect, OperationNode};
use crate::status::{NodeStatus, StatusLevel, StatusShape};
use crate::types::RequestError;

/// Largest TTL the cloud accepts, in seconds.
pub const MAX_TTL_SECS: u32 = 16_777_216;

pub struct PublishNode {
    cfg: PublishNodeConfig,
}

impl PublishNode {
    pub fn new(mut cfg: PublishNodeConfig) -> Self {
        truncate_field(&cfg.id, "evtname", &mut cfg.evtname, MAX_NAME_CHARS);
        truncate_field(&cfg.id, "param", &mut cfg.param, MAX_DATA_CHARS);
        cfg.ttl = cfg.ttl.min(MAX_TTL_SECS);
        let mut node = Self { cfg };
        node.fill_blank_name();
        node
    }

    pub fn config(&self) -> &PublishNodeConfig {
        &self.cfg
    }

    fn set_name(&mut self, name: String) {
        self.cfg.evtname = name;
        truncate_field(&self.cfg.id, "evtname", &mut self.cfg.evtname, MAX_NAME_CHARS);
        self.fill_blank_name();
    }

    /// A blank event name is replaced by the fallback, so every request
    /// built from this node carries a name.
    fn fill_blank_name(&mut self) {
        if self.cfg.evtname.trim().is_empty() {
            tracing::warn!(
                node_id = %self.cfg.id,
                fallback = FALLBACK_EVENT_NAME,
                "no event name defined, using fallback"
            );
            self.cfg.evtname = FALLBACK_EVENT_NAME.to_owned();
        }
    }

    fn set_data(&mut self, message: &Message) {
        self.cfg.param = value_to_text(&message.payload);
        truncate_field(&self.cfg.id, "param", &mut self.cfg.param, MAX_DATA_CHARS);
    }

    /// Report what is about to be sent.
    fn execute(&self) -> Applied {
        let text = format!("{}:{} SENT", self.cfg.evtname, self.cfg.param);
        Applied::new(
            Effect::Invoke,
            Some(NodeStatus::shown(StatusLevel::Info, StatusShape::Dot, text)),
        )
    }
}

/// Clamp a TTL payload to the range the cloud accepts.
fn parse_ttl(value: &serde_json::Value) -> Option<u32> {
    let secs = value_to_f64(value).filter(|s| !s.is_nan())?;
    Some(secs.clamp(0.0, MAX_TTL_SECS as f64) as u32)
}

impl OperationNode for PublishNode {
    fn id(&self) -> &str {
        &self.cfg.id
    }

    fn kind(&self) -> &'static str {
        "publish"
    }

    fn repeat_secs(&self) -> f64 {
        self.cfg.repeat
    }

    fn once(&self) -> bool {
        self.cfg.once
    }

    fn apply(&mut self, message: Message) -> Applied {
        let changed = |topic: &str, m: &Message| {
            Some(NodeStatus::changed(topic, value_to_text(&m.payload)))
        };

        match message.topic() {
            Some("evtname") => {
                self.set_name(value_to_text(&message.payload));
                Applied::new(Effect::Updated, changed("evtname", &message))
            }
            Some("param") => {
                self.set_data(&message);
                self.execute()
            }
            Some("private") => {
                self.cfg.private = is_truthy(&message.payload);
                Applied::new(Effect::Updated, changed("private", &message))
            }
            Some("ttl") => match parse_ttl(&message.payload) {
                Some(ttl) => {
                    self.cfg.ttl = ttl;
                    Applied::new(Effect::Updated, changed("ttl", &message))
                }
                None => {
                    tracing::warn!(node_id = %self.cfg.id, "ignored invalid ttl");
                    Applied::ignored()
                }
            },
            Some("repeat") => {
                let secs = value_to_f64(&message.payload).unwrap_or(0.0);
                self.cfg.repeat = secs;
                Applied::new(Effect::Repeat(secs), changed("repeat", &message))
            }
            Some(topic) if self.cfg.evtnametopic => {
                self.set_name(topic.to_owned());
                self.set_data(&message);
                self.execute()
            }
            None if message.has_payload() => {
                self.set_data(&message);
                self.execute()
            }
            _ => Applied::ignored(),
        }
    }

    fn build_request(&self) -> Result<OperationRequest, RequestError> {
        Ok(OperationRequest::PublishEvent(PublishParams {
            name: self.cfg.evtname.clone(),
            data: self.cfg.param.clone(),
            private: self.cfg.private,
            ttl: self.cfg.ttl,
            product: self
                .cfg
                .product_id_or_slug
                .clone()
                .filter(|p| !p.trim().is_empty()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg() -> PublishNodeConfig {
        PublishNodeConfig {
            id: "p".into(),
            evtname: "temp".into(),
            param: String::new(),
            product_id_or_slug: None,
            private: false,
            ttl: 60,
            repeat: 0.0,
            once: false,
            evtnametopic: false,
        }
    }

    fn params(n: &PublishNode) -> PublishParams {
        match n.build_request().unwrap() {
            OperationRequest::PublishEvent(p) => p,
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn shortcut_publishes_payload() {
        let mut n = PublishNode::new(cfg());
        let applied = n.apply(Message::new("21.5"));
        assert_eq!(applied.effect, Effect::Invoke);
        assert_eq!(applied.status.unwrap().text(), "temp:21.5 SENT");
        assert_eq!(params(&n).data, "21.5");
    }

    #[test]
    fn object_payload_is_sent_as_json() {
        let mut n = PublishNode::new(cfg());
        n.apply(Message::with_topic("param", json!({"t": 1})));
        assert_eq!(params(&n).data, r#"{"t":1}"#);
    }

    #[test]
    fn long_data_and_name_are_truncated() {
        let mut n = PublishNode::new(cfg());
        n.apply(Message::with_topic("evtname", "e".repeat(70)));
        n.apply(Message::new("d".repeat(700)));
        let p = params(&n);
        assert_eq!(p.name.chars().count(), 64);
        assert_eq!(p.data.chars().count(), 622);
    }

    #[test]
    fn evtname_topic_does_not_publish() {
        let mut n = PublishNode::new(cfg());
        let applied = n.apply(Message::with_topic("evtname", "humidity"));
        assert_eq!(applied.effect, Effect::Updated);
        assert_eq!(applied.status.unwrap().text(), "evtname changed to humidity");
        assert_eq!(params(&n).name, "humidity");
    }

    #[test]
    fn ttl_is_clamped() {
        let mut n = PublishNode::new(cfg());
        n.apply(Message::with_topic("ttl", 99_999_999));
        assert_eq!(n.config().ttl, MAX_TTL_SECS);
        n.apply(Message::with_topic("ttl", -5));
        assert_eq!(n.config().ttl, 0);
        assert_eq!(n.apply(Message::with_topic("ttl", "soon")).effect, Effect::Ignored);
        assert_eq!(n.config().ttl, 0);
    }

    #[test]
    fn private_and_repeat_topics() {
        let mut n = PublishNode::new(cfg());
        n.apply(Message::with_topic("private", true));
        assert!(params(&n).private);
        assert_eq!(
            n.apply(Message::with_topic("repeat", "2")).effect,
            Effect::Repeat(2.0)
        );
    }

    #[test]
    fn evtnametopic_mode_uses_topic_as_name() {
        let mut n = PublishNode::new(PublishNodeConfig {
            evtnametopic: true,
            ..cfg()
        });
        let applied = n.apply(Message::with_topic("door/open", "front"));
        assert_eq!(applied.effect, Effect::Invoke);
        let p = params(&n);
        assert_eq!(p.name, "door/open");
        assert_eq!(p.data, "front");
    }

    #[test]
    fn unknown_topic_is_ignored_without_evtnametopic() {
        let mut n = PublishNode::new(cfg());
        assert_eq!(n.apply(Message::with_topic("door", "x")).effect, Effect::Ignored);
        assert_eq!(n.apply(Message::new("")).effect, Effect::Ignored);
    }

    #[test]
    fn blank_name_falls_back() {
        let mut n = PublishNode::new(PublishNodeConfig {
            evtname: String::new(),
            ..cfg()
        });
        // A startup publish runs before any message arrives.
        assert_eq!(params(&n).name, FALLBACK_EVENT_NAME);
        n.apply(Message::new("x"));
        assert_eq!(params(&n).name, FALLBACK_EVENT_NAME);
    }

    #[test]
    fn blank_evtname_topic_falls_back() {
        let mut n = PublishNode::new(cfg());
        n.apply(Message::with_topic("evtname", "  "));
        assert_eq!(params(&n).name, FALLBACK_EVENT_NAME);
    }
}
