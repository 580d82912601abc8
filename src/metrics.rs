//! Metrics Collection
//!
//! Atomic counters for admission decisions and webhook outcomes, with a
//! Prometheus-compatible text export served at `/metrics` and a snapshot
//! consumed by the `/status` endpoint.
//!
//! # Example
//!
//! ```rust,no_run
//! use bragfeed::metrics::global_metrics;
//!
//! global_metrics().record_webhook_received();
//! let output = global_metrics().to_prometheus_format();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::ratelimit::Decision;

/// Thread-safe counters for the service's two mechanisms.
#[derive(Debug)]
pub struct Metrics {
    // === Rate limiting ===
    /// Requests admitted under the limit
    pub admitted_total: AtomicU64,
    /// Requests rejected by a limit
    pub rejected_total: AtomicU64,
    /// Requests admitted because the store failed (fail-open)
    pub degraded_total: AtomicU64,

    // === Webhooks ===
    /// Verified deliveries received
    pub webhook_received_total: AtomicU64,
    /// Deliveries a handler applied
    pub webhook_processed_total: AtomicU64,
    /// Deliveries with no registered handler
    pub webhook_ignored_total: AtomicU64,
    /// Expected failures acknowledged as received
    pub webhook_handled_failures_total: AtomicU64,
    /// Infrastructure failures surfaced as non-success
    pub webhook_unexpected_failures_total: AtomicU64,

    /// When this collector was created
    start_time: Instant,
}

impl Metrics {
    /// Create a collector with all counters at zero.
    pub fn new() -> Self {
        Self {
            admitted_total: AtomicU64::new(0),
            rejected_total: AtomicU64::new(0),
            degraded_total: AtomicU64::new(0),
            webhook_received_total: AtomicU64::new(0),
            webhook_processed_total: AtomicU64::new(0),
            webhook_ignored_total: AtomicU64::new(0),
            webhook_handled_failures_total: AtomicU64::new(0),
            webhook_unexpected_failures_total: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record an admission decision.
    pub fn record_decision(&self, decision: &Decision) {
        match decision {
            Decision::Admitted => self.admitted_total.fetch_add(1, Ordering::Relaxed),
            Decision::DegradedAdmitted => self.degraded_total.fetch_add(1, Ordering::Relaxed),
            Decision::Rejected { .. } => self.rejected_total.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record a verified webhook delivery.
    pub fn record_webhook_received(&self) {
        self.webhook_received_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivery a handler applied.
    pub fn record_webhook_processed(&self) {
        self.webhook_processed_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivery with no registered handler.
    pub fn record_webhook_ignored(&self) {
        self.webhook_ignored_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an expected failure acknowledged as received.
    pub fn record_webhook_handled_failure(&self) {
        self.webhook_handled_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record an infrastructure failure surfaced as non-success.
    pub fn record_webhook_unexpected_failure(&self) {
        self.webhook_unexpected_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the collector was created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admitted_total: self.admitted_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            degraded_total: self.degraded_total.load(Ordering::Relaxed),
            webhook_received_total: self.webhook_received_total.load(Ordering::Relaxed),
            webhook_processed_total: self.webhook_processed_total.load(Ordering::Relaxed),
            webhook_ignored_total: self.webhook_ignored_total.load(Ordering::Relaxed),
            webhook_handled_failures_total: self
                .webhook_handled_failures_total
                .load(Ordering::Relaxed),
            webhook_unexpected_failures_total: self
                .webhook_unexpected_failures_total
                .load(Ordering::Relaxed),
        }
    }

    /// Render counters in Prometheus text exposition format.
    pub fn to_prometheus_format(&self) -> String {
        let s = self.snapshot();
        let mut out = String::with_capacity(1024);

        let counters = [
            (
                "bragfeed_ratelimit_admitted_total",
                "Requests admitted under the limit",
                s.admitted_total,
            ),
            (
                "bragfeed_ratelimit_rejected_total",
                "Requests rejected by a limit",
                s.rejected_total,
            ),
            (
                "bragfeed_ratelimit_degraded_total",
                "Requests admitted while the store was unreachable",
                s.degraded_total,
            ),
            (
                "bragfeed_webhook_received_total",
                "Verified webhook deliveries received",
                s.webhook_received_total,
            ),
            (
                "bragfeed_webhook_processed_total",
                "Webhook deliveries applied by a handler",
                s.webhook_processed_total,
            ),
            (
                "bragfeed_webhook_ignored_total",
                "Webhook deliveries with no registered handler",
                s.webhook_ignored_total,
            ),
            (
                "bragfeed_webhook_handled_failures_total",
                "Expected webhook failures acknowledged as received",
                s.webhook_handled_failures_total,
            ),
            (
                "bragfeed_webhook_unexpected_failures_total",
                "Webhook infrastructure failures",
                s.webhook_unexpected_failures_total,
            ),
        ];

        for (name, help, value) in counters {
            out.push_str(&format!("# HELP {} {}\n", name, help));
            out.push_str(&format!("# TYPE {} counter\n", name));
            out.push_str(&format!("{} {}\n", name, value));
        }

        out.push_str("# HELP bragfeed_uptime_seconds Seconds since the collector started\n");
        out.push_str("# TYPE bragfeed_uptime_seconds gauge\n");
        out.push_str(&format!(
            "bragfeed_uptime_seconds {}\n",
            self.uptime().as_secs()
        ));

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable copy of the counters, as exposed by `/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Requests admitted under the limit
    pub admitted_total: u64,
    /// Requests rejected by a limit
    pub rejected_total: u64,
    /// Requests admitted while the store was unreachable
    pub degraded_total: u64,
    /// Verified deliveries received
    pub webhook_received_total: u64,
    /// Deliveries a handler applied
    pub webhook_processed_total: u64,
    /// Deliveries with no registered handler
    pub webhook_ignored_total: u64,
    /// Expected failures acknowledged as received
    pub webhook_handled_failures_total: u64,
    /// Infrastructure failures surfaced as non-success
    pub webhook_unexpected_failures_total: u64,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// The process-wide collector.
pub fn global_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
