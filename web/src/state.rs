//! Application state shared by every handler.

use salon_loyalty_runtime::LoyaltyLedger;
use salon_loyalty_runtime::metrics::MetricsExporter;
use std::sync::Arc;

/// The ledger service and the metrics handle.
///
/// Cloned per request by axum; both fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// The loyalty ledger
    pub ledger: Arc<LoyaltyLedger>,
    /// Prometheus exporter behind `GET /metrics`
    pub metrics: MetricsExporter,
}

impl AppState {
    /// Create state without a metrics exporter.
    #[must_use]
    pub fn new(ledger: LoyaltyLedger) -> Self {
        Self {
            ledger: Arc::new(ledger),
            metrics: MetricsExporter::disabled(),
        }
    }

    /// Serve metrics from `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsExporter) -> Self {
        self.metrics = metrics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
