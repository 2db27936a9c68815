//! Bridge metrics, exported as JSON on the admin listener.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Callback bridge counters
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    // Bridge invocations
    pub bridges_total: AtomicU64,
    pub echoes_total: AtomicU64,
    pub fulfilled_total: AtomicU64,
    pub timeouts_total: AtomicU64,
    pub malformed_total: AtomicU64,
    pub dispatch_failures_total: AtomicU64,

    // Bridges currently suspended
    pub waiting: AtomicU64,

    // Inbound callbacks
    pub callbacks_acknowledged: AtomicU64,
    pub callbacks_unmatched: AtomicU64,

    // Wait latency (simplified - sum and count, no histogram)
    pub total_wait_ms: AtomicU64,
    pub wait_count: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bridge invocation that found its target
    pub fn record_bridge(&self) {
        self.bridges_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request answered from a non-bridged target
    pub fn record_echo(&self) {
        self.echoes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a bridge entering the waiting state
    pub fn record_wait_started(&self) {
        self.waiting.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a bridge leaving the waiting state, whatever the outcome
    pub fn record_wait_finished(&self) {
        self.waiting.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a delivered callback and how long the caller waited for it
    pub fn record_fulfilled(&self, waited: Duration) {
        self.fulfilled_total.fetch_add(1, Ordering::Relaxed);
        self.total_wait_ms
            .fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
        self.wait_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inbound callback; `matched` is false when no wait took it
    pub fn record_callback(&self, matched: bool) {
        if matched {
            self.callbacks_acknowledged.fetch_add(1, Ordering::Relaxed);
        } else {
            self.callbacks_unmatched.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get average wait in ms over fulfilled bridges
    pub fn average_wait_ms(&self) -> f64 {
        let total = self.total_wait_ms.load(Ordering::Relaxed);
        let count = self.wait_count.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "bridge": {
                "total": self.bridges_total.load(Ordering::Relaxed),
                "echoes": self.echoes_total.load(Ordering::Relaxed),
                "fulfilled": self.fulfilled_total.load(Ordering::Relaxed),
                "timeouts": self.timeouts_total.load(Ordering::Relaxed),
                "malformed": self.malformed_total.load(Ordering::Relaxed),
                "dispatch_failures": self.dispatch_failures_total.load(Ordering::Relaxed),
                "waiting": self.waiting.load(Ordering::Relaxed),
            },
            "callbacks": {
                "acknowledged": self.callbacks_acknowledged.load(Ordering::Relaxed),
                "unmatched": self.callbacks_unmatched.load(Ordering::Relaxed),
            },
            "latency": {
                "average_wait_ms": self.average_wait_ms(),
            }
        })
    }
}
