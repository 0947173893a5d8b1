//! Wire types for the Particle device cloud.
//!
//! Request parameters are plain structs passed to [`DeviceCloud`]
//! (crate::provider::DeviceCloud) methods; responses are kept as raw JSON
//! bodies because each node projects them differently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Responses
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Raw HTTP response: status code plus the JSON body (or the body text as
/// a JSON string when it is not JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct CloudResponse {
    pub status_code: u16,
    pub body: Value,
}

impl CloudResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A device, optionally addressed through a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRef {
    pub device_id: String,
    pub product: Option<String>,
}

/// PUT /v1/devices/{id} with `name` or `signal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceUpdate {
    Rename(String),
    Signal(bool),
}

/// GET /v1/devices/{id}/{name} and POST /v1/devices/{id}/{name}.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCall {
    pub device: DeviceRef,
    pub name: String,
    /// Function argument; `None` for variable reads.
    pub argument: Option<String>,
}

/// POST /v1/devices/events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishParams {
    pub name: String,
    pub data: String,
    pub private: bool,
    pub ttl: u32,
    pub product: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event stream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which slice of the event feed to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamScope {
    /// Every public event.
    Firehose,
    /// Events from devices owned by the token's account.
    Mine,
    Device(String),
    Product(String),
    Org(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFilter {
    pub scope: StreamScope,
    /// Event name prefix. `None` subscribes to every event in scope.
    pub name: Option<String>,
}

impl StreamFilter {
    /// URL path segments after the API version, e.g.
    /// `["devices", "abc", "events", "temp"]`.
    pub fn path_segments(&self) -> Vec<String> {
        let mut segments = Vec::new();
        match &self.scope {
            StreamScope::Firehose => {}
            StreamScope::Mine => segments.push("devices".to_owned()),
            StreamScope::Device(id) => {
                segments.push("devices".to_owned());
                segments.push(id.clone());
            }
            StreamScope::Product(p) => {
                segments.push("products".to_owned());
                segments.push(p.clone());
            }
            StreamScope::Org(o) => {
                segments.push("orgs".to_owned());
                segments.push(o.clone());
            }
        }
        segments.push("events".to_owned());
        if let Some(name) = self.name.as_ref().filter(|n| !n.is_empty()) {
            segments.push(name.clone());
        }
        segments
    }
}

/// One published event as delivered on the stream.
///
/// Serialized as the outbound `payload` of event-stream nodes. Envelope
/// fields this type does not model (`userid`, `productID`, `public`, ...)
/// and known fields whose value did not parse are carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    pub name: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coreid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CloudEvent {
    /// Build an event from an SSE `event:` name and `data:` payload.
    ///
    /// A payload that is not a JSON object is kept verbatim in `data`.
    /// Fields of the envelope are parsed one at a time, so a single
    /// malformed field never costs the others.
    pub fn from_frame(name: String, data: &str) -> Self {
        let mut body = match serde_json::from_str::<Value>(data) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Self {
                    name,
                    data: Some(data.to_owned()),
                    ttl: None,
                    published_at: None,
                    coreid: None,
                    extra: Map::new(),
                }
            }
        };

        // The SSE event name wins over any `name` in the body.
        body.remove("name");
        let data = match body.remove("data") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };
        let ttl = take_field(&mut body, "ttl", |v| match v {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        let published_at = take_field(&mut body, "published_at", |v| {
            v.as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc))
        });
        let coreid = take_field(&mut body, "coreid", |v| v.as_str().map(str::to_owned));

        Self {
            name,
            data,
            ttl,
            published_at,
            coreid,
            extra: body,
        }
    }
}

/// Remove `key` from `rest` and convert it. A value that does not convert
/// is put back so it still reaches the payload.
fn take_field<T>(
    rest: &mut Map<String, Value>,
    key: &str,
    convert: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let value = rest.remove(key)?;
    if value.is_null() {
        return None;
    }
    let converted = convert(&value);
    if converted.is_none() {
        rest.insert(key.to_owned(), value);
    }
    converted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(scope: StreamScope, name: Option<&str>) -> Vec<String> {
        StreamFilter {
            scope,
            name: name.map(str::to_owned),
        }
        .path_segments()
    }

    #[test]
    fn firehose_path() {
        assert_eq!(filter(StreamScope::Firehose, None), vec!["events"]);
        assert_eq!(filter(StreamScope::Firehose, Some("temp")), vec!["events", "temp"]);
    }

    #[test]
    fn mine_path_has_no_device_segment() {
        assert_eq!(filter(StreamScope::Mine, Some("t")), vec!["devices", "events", "t"]);
    }

    #[test]
    fn device_product_org_paths() {
        assert_eq!(
            filter(StreamScope::Device("abc".into()), None),
            vec!["devices", "abc", "events"]
        );
        assert_eq!(
            filter(StreamScope::Product("prod".into()), Some("x")),
            vec!["products", "prod", "events", "x"]
        );
        assert_eq!(
            filter(StreamScope::Org("acme".into()), None),
            vec!["orgs", "acme", "events"]
        );
    }

    #[test]
    fn empty_name_is_ignored() {
        assert_eq!(filter(StreamScope::Mine, Some("")), vec!["devices", "events"]);
    }

    #[test]
    fn frame_with_envelope_parses() {
        let ev = CloudEvent::from_frame(
            "temp".into(),
            r#"{"data":"23.5","ttl":60,"published_at":"2024-03-01T10:00:00.000Z","coreid":"abc"}"#,
        );
        assert_eq!(ev.name, "temp");
        assert_eq!(ev.data.as_deref(), Some("23.5"));
        assert_eq!(ev.ttl, Some(60));
        assert_eq!(ev.coreid.as_deref(), Some("abc"));
        assert!(ev.published_at.is_some());
    }

    #[test]
    fn frame_without_envelope_keeps_raw_data() {
        let ev = CloudEvent::from_frame("raw".into(), "not json");
        assert_eq!(ev.data.as_deref(), Some("not json"));
        assert!(ev.coreid.is_none());
        assert!(ev.extra.is_empty());
    }

    #[test]
    fn unmodelled_envelope_fields_are_kept() {
        let ev = CloudEvent::from_frame(
            "temp".into(),
            r#"{"data":"1","coreid":"abc","userid":"u1","productID":1234,"version":3,"public":false}"#,
        );
        assert_eq!(ev.coreid.as_deref(), Some("abc"));
        assert_eq!(ev.extra["userid"], serde_json::json!("u1"));
        assert_eq!(ev.extra["productID"], serde_json::json!(1234));
        assert_eq!(ev.extra["public"], serde_json::json!(false));

        let payload = serde_json::to_value(&ev).unwrap();
        assert_eq!(payload["version"], serde_json::json!(3));
        assert_eq!(payload["data"], serde_json::json!("1"));
    }

    #[test]
    fn malformed_field_does_not_discard_envelope() {
        let ev = CloudEvent::from_frame(
            "temp".into(),
            r#"{"data":"23.5","ttl":"60","published_at":"yesterday","coreid":"abc"}"#,
        );
        assert_eq!(ev.data.as_deref(), Some("23.5"));
        assert_eq!(ev.ttl, Some(60));
        assert_eq!(ev.coreid.as_deref(), Some("abc"));
        assert!(ev.published_at.is_none());
        assert_eq!(ev.extra["published_at"], serde_json::json!("yesterday"));

        let payload = serde_json::to_value(&ev).unwrap();
        assert_eq!(payload["published_at"], serde_json::json!("yesterday"));
    }

    #[test]
    fn non_string_data_is_stringified() {
        let ev = CloudEvent::from_frame("n".into(), r#"{"data":42}"#);
        assert_eq!(ev.data.as_deref(), Some("42"));
    }
}
