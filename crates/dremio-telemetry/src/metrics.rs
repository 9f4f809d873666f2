//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counts reconciliation outcomes, status polls, terminal tracker events and
//!   remote calls.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared by the reflection tasks.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    reconciliations_total: IntCounterVec,
    reconciliation_failures_total: IntCounter,
    status_polls_total: IntCounter,
    tracker_events_total: IntCounterVec,
    remote_calls_total: IntCounterVec,
    remote_call_failures_total: IntCounter,
    active_trackers: IntGauge,
}

/// Snapshot of selected counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Reconciliations that created a reflection.
    pub reconciliations_created: u64,
    /// Reconciliations that updated a reflection in place.
    pub reconciliations_updated: u64,
    /// Reconciliations that only triggered a refresh.
    pub reconciliations_refreshed: u64,
    /// Reconciliations that aborted with an error.
    pub reconciliation_failures_total: u64,
    /// Reflection status polls issued.
    pub status_polls_total: u64,
    /// Tracking sessions that ended in success.
    pub tracker_success_total: u64,
    /// Tracking sessions that ended because the reflection was disabled.
    pub tracker_disabled_total: u64,
    /// Tracking sessions that ended in error or timeout.
    pub tracker_error_total: u64,
    /// Remote calls that failed.
    pub remote_call_failures_total: u64,
    /// Tracking sessions currently in progress.
    pub active_trackers: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let reconciliations_total = IntCounterVec::new(
            Opts::new(
                "reflection_reconciliations_total",
                "Completed reconciliations by resulting action",
            ),
            &["action"],
        )?;
        let reconciliation_failures_total = IntCounter::with_opts(Opts::new(
            "reflection_reconciliation_failures_total",
            "Reconciliations aborted by an error",
        ))?;
        let status_polls_total = IntCounter::with_opts(Opts::new(
            "reflection_status_polls_total",
            "Reflection status polls issued",
        ))?;
        let tracker_events_total = IntCounterVec::new(
            Opts::new(
                "reflection_tracker_events_total",
                "Terminal tracker events by status",
            ),
            &["status"],
        )?;
        let remote_calls_total = IntCounterVec::new(
            Opts::new("remote_calls_total", "Remote API calls by operation and outcome"),
            &["operation", "outcome"],
        )?;
        let remote_call_failures_total = IntCounter::with_opts(Opts::new(
            "remote_call_failures_total",
            "Remote API calls that failed",
        ))?;
        let active_trackers = IntGauge::with_opts(Opts::new(
            "reflection_active_trackers",
            "Tracking sessions currently in progress",
        ))?;

        registry.register(Box::new(reconciliations_total.clone()))?;
        registry.register(Box::new(reconciliation_failures_total.clone()))?;
        registry.register(Box::new(status_polls_total.clone()))?;
        registry.register(Box::new(tracker_events_total.clone()))?;
        registry.register(Box::new(remote_calls_total.clone()))?;
        registry.register(Box::new(remote_call_failures_total.clone()))?;
        registry.register(Box::new(active_trackers.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                reconciliations_total,
                reconciliation_failures_total,
                status_polls_total,
                tracker_events_total,
                remote_calls_total,
                remote_call_failures_total,
                active_trackers,
            }),
        })
    }

    /// Count a completed reconciliation (`created`, `updated` or `refreshed`).
    pub fn inc_reconciliation(&self, action: &str) {
        self.inner
            .reconciliations_total
            .with_label_values(&[action])
            .inc();
    }

    /// Count a reconciliation that aborted.
    pub fn inc_reconciliation_failure(&self) {
        self.inner.reconciliation_failures_total.inc();
    }

    /// Count a reflection status poll.
    pub fn inc_status_poll(&self) {
        self.inner.status_polls_total.inc();
    }

    /// Count a terminal tracker event (`success`, `disabled` or `error`).
    pub fn inc_tracker_event(&self, status: &str) {
        self.inner
            .tracker_events_total
            .with_label_values(&[status])
            .inc();
    }

    /// Count a remote call; `success == false` also bumps the failure total.
    pub fn inc_remote_call(&self, operation: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner
            .remote_calls_total
            .with_label_values(&[operation, outcome])
            .inc();
        if !success {
            self.inner.remote_call_failures_total.inc();
        }
    }

    /// Mark a tracking session as started.
    pub fn tracker_started(&self) {
        self.inner.active_trackers.inc();
    }

    /// Mark a tracking session as finished.
    pub fn tracker_finished(&self) {
        self.inner.active_trackers.dec();
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
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the most relevant counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let reconciled = |action: &str| {
            self.inner
                .reconciliations_total
                .with_label_values(&[action])
                .get()
        };
        let events = |status: &str| {
            self.inner
                .tracker_events_total
                .with_label_values(&[status])
                .get()
        };
        MetricsSnapshot {
            reconciliations_created: reconciled("created"),
            reconciliations_updated: reconciled("updated"),
            reconciliations_refreshed: reconciled("refreshed"),
            reconciliation_failures_total: self.inner.reconciliation_failures_total.get(),
            status_polls_total: self.inner.status_polls_total.get(),
            tracker_success_total: events("success"),
            tracker_disabled_total: events("disabled"),
            tracker_error_total: events("error"),
            remote_call_failures_total: self.inner.remote_call_failures_total.get(),
            active_trackers: self.inner.active_trackers.get(),
        }
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
