//! Prometheus metrics definitions for github-rate-limit-exporter.
//!
//! `MetricsSink` owns its own registry and every gauge the exporter
//! publishes. It is created once at startup and shared between the poller,
//! which writes, and the `/metrics` handler, which reads.
//!
//! The three gauges of a resource are written together under a write guard
//! and gathered under a read guard, so a scrape never sees a resource whose
//! limit, remaining and reset come from different polls.

use prometheus::{
    Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::github::{Rate, Resource};

pub const NAMESPACE: &str = "github";
pub const SUBSYSTEM: &str = "rate_limit";

/// Label carrying the resource category.
pub const RESOURCE_LABEL: &str = "resource";

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 16 * 1024;

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(name, help)
        .namespace(NAMESPACE)
        .subsystem(SUBSYSTEM)
}

/// Gauges and counters exported for GitHub rate limits.
pub struct MetricsSink {
    registry: Registry,
    rate_limit: GaugeVec,
    rate_remaining: GaugeVec,
    rate_reset: GaugeVec,
    pat_token_expiry: Gauge,
    last_run_time: Gauge,
    poll_failures: IntCounter,
    request_duration: HistogramVec,
    /// Resources written at least once. Also serialises writers against
    /// `gather()`.
    populated: RwLock<BTreeSet<Resource>>,
}

impl MetricsSink {
    /// Creates and registers all metrics with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let rate_limit = GaugeVec::new(
            opts("limit", "The limit for different types of GitHub API requests"),
            &[RESOURCE_LABEL],
        )?;
        let rate_remaining = GaugeVec::new(
            opts(
                "remaining",
                "The remaining rate for different types of GitHub API requests",
            ),
            &[RESOURCE_LABEL],
        )?;
        let rate_reset = GaugeVec::new(
            opts(
                "reset",
                "The reset time (unix seconds) for different types of GitHub API requests",
            ),
            &[RESOURCE_LABEL],
        )?;
        let pat_token_expiry = Gauge::with_opts(opts(
            "pat_token_expiry",
            "The expiry time for current token in ms",
        ))?;
        let last_run_time = Gauge::with_opts(opts(
            "last_run_time",
            "The last time the batch process checked for metrics",
        ))?;
        let poll_failures = IntCounter::with_opts(opts(
            "poll_failures_total",
            "Number of rate limit polls that failed",
        ))?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests.",
            ),
            &["operation", "action"],
        )?;

        registry.register(Box::new(rate_limit.clone()))?;
        registry.register(Box::new(rate_remaining.clone()))?;
        registry.register(Box::new(rate_reset.clone()))?;
        registry.register(Box::new(pat_token_expiry.clone()))?;
        registry.register(Box::new(last_run_time.clone()))?;
        registry.register(Box::new(poll_failures.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            rate_limit,
            rate_remaining,
            rate_reset,
            pat_token_expiry,
            last_run_time,
            poll_failures,
            request_duration,
            populated: RwLock::new(BTreeSet::new()),
        })
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, BTreeSet<Resource>> {
        self.populated.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, BTreeSet<Resource>> {
        self.populated.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores limit, remaining and reset (unix seconds) for one resource.
    pub fn set_rate(&self, resource: Resource, limit: i64, remaining: i64, reset: i64) {
        let label = [resource.as_str()];
        let mut populated = self.write_guard();
        self.rate_limit.with_label_values(&label).set(limit as f64);
        self.rate_remaining
            .with_label_values(&label)
            .set(remaining as f64);
        self.rate_reset.with_label_values(&label).set(reset as f64);
        populated.insert(resource);
    }

    /// Stores the token expiry as unix milliseconds.
    pub fn set_token_expiry(&self, epoch_millis: i64) {
        self.pat_token_expiry.set(epoch_millis as f64);
    }

    pub fn set_last_run(&self, epoch_seconds: f64) {
        self.last_run_time.set(epoch_seconds);
    }

    pub fn set_last_run_now(&self) {
        let now = chrono::Utc::now();
        self.set_last_run(now.timestamp_millis() as f64 / 1000.0);
    }

    pub fn record_poll_failure(&self) {
        self.poll_failures.inc();
    }

    pub fn observe_request(&self, operation: &str, action: &str, seconds: f64) {
        self.request_duration
            .with_label_values(&[operation, action])
            .observe(seconds);
    }

    /// Current values for a resource, or `None` if it was never set.
    pub fn rate(&self, resource: Resource) -> Option<Rate> {
        let populated = self.read_guard();
        if !populated.contains(&resource) {
            return None;
        }
        let label = [resource.as_str()];
        Some(Rate {
            limit: self.rate_limit.with_label_values(&label).get() as i64,
            remaining: self.rate_remaining.with_label_values(&label).get() as i64,
            reset: self.rate_reset.with_label_values(&label).get() as i64,
        })
    }

    pub fn token_expiry_millis(&self) -> i64 {
        self.pat_token_expiry.get() as i64
    }

    pub fn last_run_seconds(&self) -> f64 {
        self.last_run_time.get()
    }

    pub fn poll_failures(&self) -> u64 {
        self.poll_failures.get()
    }

    /// Renders all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let families = {
            let _populated = self.read_guard();
            self.registry.gather()
        };

        let mut buffer = Vec::with_capacity(BUFFER_CAP);
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
