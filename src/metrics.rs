//! Bridge metrics for monitoring and observability.
//!
//! Counters are lock-free atomics except the per-code failure map, which is
//! only touched on the failure path.

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time copy of the bridge counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStats {
    /// Calls dispatched to completion
    pub total_calls: u64,

    /// Calls that produced a success response
    pub successful_calls: u64,

    /// Calls that produced a failure response
    pub failed_calls: u64,

    /// Average handler time in microseconds
    pub avg_dispatch_time_us: f64,

    /// Responses handed to the embedded environment
    pub responses_delivered: u64,

    /// Responses dropped because the script could not run
    pub responses_dropped: u64,

    /// Inbound messages passed to the generic message handler
    pub messages_forwarded: u64,

    /// Bootstrap injections performed
    pub injections: u64,
}

/// Metrics collector shared by the dispatcher, router and host
pub struct BridgeMetrics {
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    total_dispatch_time_us: AtomicU64,
    responses_delivered: AtomicU64,
    responses_dropped: AtomicU64,
    messages_forwarded: AtomicU64,
    injections: AtomicU64,
    error_counts: parking_lot::Mutex<HashMap<ErrorCode, u64>>,
}

impl BridgeMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            total_dispatch_time_us: AtomicU64::new(0),
            responses_delivered: AtomicU64::new(0),
            responses_dropped: AtomicU64::new(0),
            messages_forwarded: AtomicU64::new(0),
            injections: AtomicU64::new(0),
            error_counts: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Record a dispatched call
    pub fn record_call(&self, duration: Duration, failure: Option<ErrorCode>) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_dispatch_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        match failure {
            None => {
                self.successful_calls.fetch_add(1, Ordering::Relaxed);
            }
            Some(code) => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
                *self.error_counts.lock().entry(code).or_insert(0) += 1;
            }
        }
    }

    /// Record a response delivery attempt
    pub fn record_delivery(&self, delivered: bool) {
        if delivered {
            self.responses_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.responses_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a message routed to the generic handler
    pub fn record_forwarded(&self) {
        self.messages_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a bootstrap injection
    pub fn record_injection(&self) {
        self.injections.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total calls
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Get average dispatch time in microseconds
    pub fn avg_dispatch_time_us(&self) -> f64 {
        let total = self.total_calls();
        if total == 0 {
            0.0
        } else {
            self.total_dispatch_time_us.load(Ordering::Relaxed) as f64 / total as f64
        }
    }

    /// Get failure counts by code
    pub fn error_counts(&self) -> HashMap<ErrorCode, u64> {
        self.error_counts.lock().clone()
    }

    /// Snapshot the counters
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            total_calls: self.total_calls(),
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            avg_dispatch_time_us: self.avg_dispatch_time_us(),
            responses_delivered: self.responses_delivered.load(Ordering::Relaxed),
            responses_dropped: self.responses_dropped.load(Ordering::Relaxed),
            messages_forwarded: self.messages_forwarded.load(Ordering::Relaxed),
            injections: self.injections.load(Ordering::Relaxed),
        }
    }

    /// Export Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let stats = self.stats();
        let mut output = String::new();

        output.push_str("# HELP nexus_bridge_calls_total Dispatched bridge calls\n");
        output.push_str("# TYPE nexus_bridge_calls_total counter\n");
        output.push_str(&format!(
            "nexus_bridge_calls_total{{status=\"success\"}} {}\n",
            stats.successful_calls
        ));
        output.push_str(&format!(
            "nexus_bridge_calls_total{{status=\"error\"}} {}\n",
            stats.failed_calls
        ));

        output.push_str("\n# HELP nexus_bridge_dispatch_time_us Average dispatch time\n");
        output.push_str("# TYPE nexus_bridge_dispatch_time_us gauge\n");
        output.push_str(&format!(
            "nexus_bridge_dispatch_time_us {:.2}\n",
            stats.avg_dispatch_time_us
        ));

        output.push_str("\n# HELP nexus_bridge_responses_total Responses by delivery outcome\n");
        output.push_str("# TYPE nexus_bridge_responses_total counter\n");
        output.push_str(&format!(
            "nexus_bridge_responses_total{{outcome=\"delivered\"}} {}\n",
            stats.responses_delivered
        ));
        output.push_str(&format!(
            "nexus_bridge_responses_total{{outcome=\"dropped\"}} {}\n",
            stats.responses_dropped
        ));

        output.push_str("\n# HELP nexus_bridge_messages_forwarded_total Non-bridge messages\n");
        output.push_str("# TYPE nexus_bridge_messages_forwarded_total counter\n");
        output.push_str(&format!(
            "nexus_bridge_messages_forwarded_total {}\n",
            stats.messages_forwarded
        ));

        output.push_str("\n# HELP nexus_bridge_injections_total Bootstrap injections\n");
        output.push_str("# TYPE nexus_bridge_injections_total counter\n");
        output.push_str(&format!("nexus_bridge_injections_total {}\n", stats.injections));

        output.push_str("\n# HELP nexus_bridge_errors_total Call failures by code\n");
        output.push_str("# TYPE nexus_bridge_errors_total counter\n");
        for (code, count) in self.error_counts() {
            output.push_str(&format!(
                "nexus_bridge_errors_total{{code=\"{}\"}} {}\n",
                code, count
            ));
        }

        output
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer for measuring handler duration
pub struct DispatchTimer {
    start: Instant,
}

impl DispatchTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
