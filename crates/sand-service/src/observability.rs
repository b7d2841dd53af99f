//! Prometheus recorder for the `sand_*` metrics.

use crate::errors::ServerError;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return its handle.
///
/// Must be called before any metrics are recorded. Token endpoint latency
/// buckets cover the 10 s default HTTP timeout.
///
/// # Errors
///
/// Returns `ServerError::Metrics` if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, ServerError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("sand_token_request_duration_seconds".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| ServerError::Metrics(format!("Failed to set token request buckets: {e}")))?
        .install_recorder()
        .map_err(|e| {
            ServerError::Metrics(format!("Failed to install Prometheus metrics recorder: {e}"))
        })
}
