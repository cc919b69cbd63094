pub mod health;
pub mod metrics;

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::registry::MetricRegistry;

/// State shared by every scrape request.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MetricRegistry>,
    /// Exporter self-metrics, appended after the snapshot families
    pub self_metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(registry: Arc<MetricRegistry>, self_metrics: Option<PrometheusHandle>) -> Self {
        Self {
            registry,
            self_metrics,
        }
    }
}
