//! Debounce and repeat scheduling for operation nodes.
//!
//! `InvocationThrottle` is a pure state machine: it owns no timers, only
//! deadlines. The node actor sleeps until [`debounce_deadline`] or
//! [`next_tick`] and reports back through [`fire`] and [`tick`], which keeps
//! the logic testable without a runtime.
//!
//! [`debounce_deadline`]: InvocationThrottle::debounce_deadline
//! [`next_tick`]: InvocationThrottle::next_tick
//! [`fire`]: InvocationThrottle::fire
//! [`tick`]: InvocationThrottle::tick

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    Idle,
    /// Debounce armed; the operation (or the repeat re-arm) is pending.
    PendingInvoke,
    /// Repeating every interval.
    Scheduled,
}

#[derive(Debug, Clone)]
pub struct InvocationThrottle {
    debounce: Duration,
    repeat: Option<Duration>,
    debounce_at: Option<Instant>,
    invoke_pending: bool,
    next_tick: Option<Instant>,
}

impl InvocationThrottle {
    pub fn new(debounce: Duration, repeat_secs: f64) -> Self {
        Self {
            debounce,
            repeat: repeat_interval(repeat_secs),
            debounce_at: None,
            invoke_pending: false,
            next_tick: None,
        }
    }

    pub fn state(&self) -> ThrottleState {
        if self.debounce_at.is_some() {
            ThrottleState::PendingInvoke
        } else if self.next_tick.is_some() {
            ThrottleState::Scheduled
        } else {
            ThrottleState::Idle
        }
    }

    pub fn repeat(&self) -> Option<Duration> {
        self.repeat
    }

    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_at
    }

    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Request an invocation. Re-arms the debounce; several triggers inside
    /// one debounce window collapse into a single call.
    pub fn trigger(&mut self, now: Instant) {
        self.debounce_at = Some(now + self.debounce);
        self.invoke_pending = true;
    }

    /// Change the repeat interval. The running repeat is dropped first; a
    /// positive interval is re-armed once the debounce expires.
    pub fn set_repeat(&mut self, secs: f64, now: Instant) {
        self.next_tick = None;
        self.repeat = repeat_interval(secs);
        if self.repeat.is_some() {
            self.debounce_at = Some(now + self.debounce);
        }
    }

    /// Debounce expired. Returns whether to invoke now.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.debounce_at.take().is_none() {
            return false;
        }
        if let Some(interval) = self.repeat {
            self.next_tick = Some(now + interval);
        }
        std::mem::take(&mut self.invoke_pending)
    }

    /// Repeat deadline reached. Returns whether to invoke now.
    pub fn tick(&mut self, now: Instant) -> bool {
        match (self.next_tick, self.repeat) {
            (Some(due), Some(interval)) => {
                // Keep the cadence anchored to the schedule, not to wakeups.
                let next = due + interval;
                self.next_tick = Some(if next > now { next } else { now + interval });
                true
            }
            _ => {
                self.next_tick = None;
                false
            }
        }
    }

    /// Drop every deadline (node teardown).
    pub fn cancel(&mut self) {
        self.debounce_at = None;
        self.invoke_pending = false;
        self.next_tick = None;
    }
}

/// Seconds to a repeat interval; zero, negative and non-finite values
/// disable repeating.
pub fn repeat_interval(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
