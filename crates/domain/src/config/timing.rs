use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Debounce, keepalive and reconnect timing shared by every node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Quiet period between the last inbound message and the remote call.
    #[serde(default = "d_5")]
    pub debounce_ms: u64,
    /// Forced stream re-subscription period.
    #[serde(default = "d_300")]
    pub keepalive_secs: u64,
    /// Delay before re-subscribing after the remote closed the stream.
    #[serde(default = "d_3000")]
    pub end_reconnect_delay_ms: u64,
    /// Treat a transport error like a stream end and schedule a reconnect.
    /// Off by default: an error only marks the status.
    #[serde(default)]
    pub reconnect_on_error: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 5,
            keepalive_secs: 300,
            end_reconnect_delay_ms: 3000,
            reconnect_on_error: false,
        }
    }
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn end_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.end_reconnect_delay_ms)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_5() -> u64 {
    5
}
fn d_300() -> u64 {
    300
}
fn d_3000() -> u64 {
    3000
}
