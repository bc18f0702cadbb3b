//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges relevant to file transfer runs.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
    core::Collector,
};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    events_emitted_total: IntCounterVec,
    runs_total: IntCounterVec,
    files_discovered_total: IntCounter,
    files_rejected_total: IntCounterVec,
    files_quarantined_total: IntCounter,
    files_transferred_total: IntCounterVec,
    bytes_transferred_total: IntCounter,
    post_process_total: IntCounterVec,
    last_run_duration_ms: IntGauge,
    in_flight_deliveries: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Candidates produced by the scanner across all runs.
    pub files_discovered_total: u64,
    /// Files moved into the error directory.
    pub files_quarantined_total: u64,
    /// Bytes written to destinations.
    pub bytes_transferred_total: u64,
    /// Duration of the most recent run in milliseconds.
    pub last_run_duration_ms: i64,
    /// Deliveries currently executing.
    pub in_flight_deliveries: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_emitted_total = counter_vec(
            "events_emitted_total",
            "Audit events emitted by type",
            &["type"],
        )?;
        let runs_total = counter_vec("runs_total", "Pipeline runs by outcome", &["outcome"])?;
        let files_discovered_total = counter(
            "files_discovered_total",
            "Candidate files produced by directory scans",
        )?;
        let files_rejected_total = counter_vec(
            "files_rejected_total",
            "Files rejected by the validation chain by category",
            &["category"],
        )?;
        let files_quarantined_total = counter(
            "files_quarantined_total",
            "Rejected files moved to the error directory",
        )?;
        let files_transferred_total = counter_vec(
            "files_transferred_total",
            "Delivery attempts by status",
            &["status"],
        )?;
        let bytes_transferred_total = counter(
            "bytes_transferred_total",
            "Bytes written to destination directories",
        )?;
        let post_process_total = counter_vec(
            "post_process_total",
            "Post-processing actions applied to source files by outcome",
            &["action", "status"],
        )?;
        let last_run_duration_ms = gauge(
            "last_run_duration_ms",
            "Wall-clock duration of the most recent run (ms)",
        )?;
        let in_flight_deliveries = gauge(
            "in_flight_deliveries",
            "Deliveries currently holding a worker slot",
        )?;

        register(&registry, "events_emitted_total", &events_emitted_total)?;
        register(&registry, "runs_total", &runs_total)?;
        register(&registry, "files_discovered_total", &files_discovered_total)?;
        register(&registry, "files_rejected_total", &files_rejected_total)?;
        register(&registry, "files_quarantined_total", &files_quarantined_total)?;
        register(&registry, "files_transferred_total", &files_transferred_total)?;
        register(&registry, "bytes_transferred_total", &bytes_transferred_total)?;
        register(&registry, "post_process_total", &post_process_total)?;
        register(&registry, "last_run_duration_ms", &last_run_duration_ms)?;
        register(&registry, "in_flight_deliveries", &in_flight_deliveries)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                events_emitted_total,
                runs_total,
                files_discovered_total,
                files_rejected_total,
                files_quarantined_total,
                files_transferred_total,
                bytes_transferred_total,
                post_process_total,
                last_run_duration_ms,
                in_flight_deliveries,
            }),
        })
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Record a finished run (`completed`, `cancelled`, or `failed`) and its duration.
    pub fn observe_run(&self, outcome: &str, duration: Duration) {
        self.inner.runs_total.with_label_values(&[outcome]).inc();
        self.inner
            .last_run_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Add scanner candidates to the discovery counter.
    pub fn add_discovered(&self, count: u64) {
        self.inner.files_discovered_total.inc_by(count);
    }

    /// Increment the rejection counter for a validation category.
    pub fn inc_rejected(&self, category: &str) {
        self.inner
            .files_rejected_total
            .with_label_values(&[category])
            .inc();
    }

    /// Increment the quarantine counter.
    pub fn inc_quarantined(&self) {
        self.inner.files_quarantined_total.inc();
    }

    /// Record a delivery attempt; bytes are only counted for successful writes.
    pub fn record_delivery(&self, status: &str, bytes: u64) {
        self.inner
            .files_transferred_total
            .with_label_values(&[status])
            .inc();
        if status == "success" {
            self.inner.bytes_transferred_total.inc_by(bytes);
        }
    }

    /// Increment the post-processing counter.
    pub fn inc_post_process(&self, action: &str, status: &str) {
        self.inner
            .post_process_total
            .with_label_values(&[action, status])
            .inc();
    }

    /// Adjust the in-flight delivery gauge by `delta`.
    pub fn add_in_flight(&self, delta: i64) {
        self.inner.in_flight_deliveries.add(delta);
    }

    /// Current value of a labelled delivery counter, used by health reporting.
    #[must_use]
    pub fn deliveries(&self, status: &str) -> u64 {
        self.inner
            .files_transferred_total
            .with_label_values(&[status])
            .get()
    }

    /// Current value of a labelled rejection counter.
    #[must_use]
    pub fn rejections(&self, category: &str) -> u64 {
        self.inner
            .files_rejected_total
            .with_label_values(&[category])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_discovered_total: self.inner.files_discovered_total.get(),
            files_quarantined_total: self.inner.files_quarantined_total.get(),
            bytes_transferred_total: self.inner.bytes_transferred_total.get(),
            last_run_duration_ms: self.inner.last_run_duration_ms.get(),
            in_flight_deliveries: self.inner.in_flight_deliveries.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
