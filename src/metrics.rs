//! Exporter self-observability
//!
//! These go through the `metrics` facade and are appended to `/metrics`
//! after the snapshot families. They describe the exporter, not the cluster.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and describe all exporter metrics.
///
/// Fails if a recorder is already installed for this process.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

fn init_metric_descriptions() {
    describe_counter!(
        "cephrgw_exporter_refresh_total",
        "Refresh passes by result"
    );
    describe_histogram!(
        "cephrgw_exporter_refresh_duration_seconds",
        "Duration of refresh passes that reached publication"
    );
    describe_counter!(
        "cephrgw_exporter_entity_fetch_errors_total",
        "Per-entity fetches left out of a snapshot, by resource"
    );
    describe_gauge!(
        "cephrgw_exporter_build_info",
        "Exporter version information"
    );

    gauge!("cephrgw_exporter_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record a pass that was published
pub fn record_refresh_success(duration: Duration) {
    counter!("cephrgw_exporter_refresh_total", "result" => "success").increment(1);
    histogram!("cephrgw_exporter_refresh_duration_seconds").record(duration.as_secs_f64());
}

/// Record a pass that failed to enumerate entities
pub fn record_refresh_failure() {
    counter!("cephrgw_exporter_refresh_total", "result" => "enumeration_error").increment(1);
}

/// Record a skipped entity fetch
pub fn record_entity_fetch_error(resource: &'static str) {
    counter!(
        "cephrgw_exporter_entity_fetch_errors_total",
        "resource" => resource,
    )
    .increment(1);
}
