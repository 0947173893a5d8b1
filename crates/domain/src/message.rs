//! Flow messages exchanged with nodes.
//!
//! A message is a JSON object with an optional `topic`, a `payload` and any
//! number of extra properties. Nodes use the topic to select which
//! configuration field a message updates; outbound messages reuse the same
//! shape with extra fields such as `statusCode`, `raw` or `id`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            topic: None,
            payload: payload.into(),
            extra: Map::new(),
        }
    }

    pub fn with_topic(topic: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::new(payload)
        }
    }

    /// Attach an extra top-level property (builder style).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The topic, with an empty string treated as absent.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref().filter(|t| !t.is_empty())
    }

    pub fn has_payload(&self) -> bool {
        is_truthy(&self.payload)
    }

    /// Look up a top-level property, including `topic` and `payload`.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "payload" => Some(self.payload.clone()),
            "topic" => self.topic.clone().map(Value::String),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// Loose truthiness as flow authors expect it: `null`, `false`, `0`, `""`
/// are false; everything else (including empty objects) is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a value the way it is sent to the cloud: strings verbatim,
/// everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Interpret a payload as a number of seconds (`"2"`, `2`, `2.5`).
/// Anything unparseable yields `None`.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
