use serde::Serialize;

/// Structured trace events emitted across all particle-flow crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RemoteCall {
        node_id: String,
        operation: String,
        status: u16,
        duration_ms: u64,
    },
    FieldTruncated {
        node_id: String,
        field: String,
        original_chars: usize,
        limit: usize,
    },
    StreamConnecting {
        node_id: String,
        generation: u64,
        url: String,
    },
    StreamConnected {
        node_id: String,
        generation: u64,
    },
    StreamEnded {
        node_id: String,
        generation: u64,
        reconnect_in_ms: u64,
    },
    StreamKeepalive {
        node_id: String,
    },
    NodeClosed {
        node_id: String,
        kind: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pf_event");
    }
}
