//! Prometheus metrics exposition
//!
//! Request-level metrics recorded by the HTTP layer:
//!
//! - `pool_requests_total` (counter): labels `route`, `status`
//! - `pool_request_duration_seconds` (histogram): label `route`
//!
//! The engine itself records `pool_operations_total`,
//! `pool_leases_expired_total` and the `pool_available` / `pool_leased`
//! gauges through the `metrics` facade.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures explicit histogram buckets so `pool_request_duration_seconds`
/// renders `_bucket` lines (usable with `histogram_quantile()`) instead of
/// the default summary.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "pool_request_duration_seconds".to_string(),
            ),
            &[0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed API request with route and status labels.
pub fn record_request(route: &'static str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "pool_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("pool_request_duration_seconds", "route" => route)
        .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_request_without_recorder_is_noop() {
        // When no recorder is installed, metrics calls are no-ops.
        record_request("/api/claim", 200, 0.005);
    }

    /// Create an isolated recorder/handle pair. install_recorder() panics on
    /// a second call in the same process, so tests never install globally.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full(
                    "pool_request_duration_seconds".to_string(),
                ),
                &[0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0],
            )
            .expect("failed to set histogram buckets")
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("/api/claim", 200, 0.002);
        record_request("/api/claim", 404, 0.001);

        let output = handle.render();
        assert!(output.contains("pool_requests_total"), "output: {output}");
        assert!(output.contains("route=\"/api/claim\""));
        assert!(output.contains("status=\"200\""));
        assert!(output.contains("status=\"404\""));
        assert!(
            output.contains("pool_request_duration_seconds_bucket"),
            "histogram must render _bucket lines"
        );
    }
}
