//! Prometheus metrics for the loyalty ledger.
//!
//! Metric names:
//!
//! - `loyalty_awards_appended_total{currency, reason}`
//! - `loyalty_awards_duplicate_total`
//! - `loyalty_reconciliations_total`
//! - `loyalty_corrections_total`
//! - `loyalty_reconcile_duration_seconds`
//! - `loyalty_store_retries_total`
//!
//! The web server installs the exporter once at startup and serves
//! [`MetricsExporter::render`] on `GET /metrics`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use salon_loyalty_core::{AwardReason, Currency};
use std::time::Duration;
use thiserror::Error;

/// Errors from installing the exporter.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Bucket configuration was rejected
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// The global recorder could not be installed
    #[error("Failed to install metrics recorder: {0}")]
    Install(String),
}

/// Handle to the installed Prometheus recorder.
#[derive(Clone, Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// When a recorder is already installed (several servers in one test
    /// binary) the exporter is returned without a handle and renders nothing.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    pub fn install() -> Result<Self, MetricsError> {
        describe_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                tracing::info!("Prometheus recorder installed");
                Ok(Self {
                    handle: Some(handle),
                })
            }
            Err(e) if e.to_string().contains("already initialized") => {
                tracing::warn!("Metrics recorder already initialized, skipping");
                Ok(Self::disabled())
            }
            Err(e) => Err(MetricsError::Install(e.to_string())),
        }
    }

    /// An exporter that renders nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { handle: None }
    }

    /// Whether this exporter owns the recorder.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }

    /// Current metrics in Prometheus text format (empty when disabled).
    #[must_use]
    pub fn render(&self) -> String {
        self.handle
            .as_ref()
            .map(PrometheusHandle::render)
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn describe_metrics() {
    describe_counter!(
        "loyalty_awards_appended_total",
        "Award events written to the ledger, by currency and reason"
    );
    describe_counter!(
        "loyalty_awards_duplicate_total",
        "Appends answered with rejected_duplicate"
    );
    describe_counter!(
        "loyalty_reconciliations_total",
        "Completed reconciliation scans"
    );
    describe_counter!(
        "loyalty_corrections_total",
        "Correction events appended by reconciliation"
    );
    describe_histogram!(
        "loyalty_reconcile_duration_seconds",
        "Time taken by one reconciliation scan"
    );
    describe_counter!(
        "loyalty_store_retries_total",
        "Retries after a transient store failure"
    );
}

/// Ledger metrics recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record an accepted append.
    pub fn record_append(currency: Currency, reason: AwardReason) {
        counter!(
            "loyalty_awards_appended_total",
            "currency" => currency.as_str(),
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    /// Record an append rejected as duplicate.
    pub fn record_duplicate() {
        counter!("loyalty_awards_duplicate_total").increment(1);
    }

    /// Record a finished reconciliation scan.
    pub fn record_reconciliation(corrections: usize, duration: Duration) {
        counter!("loyalty_reconciliations_total").increment(1);
        counter!("loyalty_corrections_total").increment(corrections as u64);
        histogram!("loyalty_reconcile_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a retry after a transient store failure.
    pub fn record_store_retry() {
        counter!("loyalty_store_retries_total").increment(1);
    }
}
