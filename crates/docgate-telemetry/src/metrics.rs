//! Prometheus metrics.
//!
//! | Metric | Type | Labels |
//! |---|---|---|
//! | `docgate_requests_total` | counter | `operation`, `status` |
//! | `docgate_request_duration_seconds` | histogram | `operation` |
//! | `docgate_store_errors_total` | counter | `operation`, `kind` |
//! | `docgate_auth_failures_total` | counter | `reason` |
//! | `docgate_requests_in_flight` | gauge | |
//!
//! Recording before [`init_metrics`] is a no-op.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Total requests, by operation and status.
pub const REQUESTS_TOTAL: &str = "docgate_requests_total";
/// Request latency, by operation.
pub const REQUEST_DURATION: &str = "docgate_request_duration_seconds";
/// Store failures, by operation and error kind.
pub const STORE_ERRORS_TOTAL: &str = "docgate_store_errors_total";
/// Rejected credentials, by reason.
pub const AUTH_FAILURES_TOTAL: &str = "docgate_auth_failures_total";
/// Requests currently being served.
pub const REQUESTS_IN_FLIGHT: &str = "docgate_requests_in_flight";

/// Global metrics handle.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address for the scrape endpoint.
    pub addr: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and its scrape listener.
///
/// # Errors
///
/// Returns an error if the address is invalid or a recorder is already
/// installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = builder
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    tracing::info!(addr = %addr, "Metrics server started");

    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of gateway requests");
    describe_histogram!(
        REQUEST_DURATION,
        metrics::Unit::Seconds,
        "Gateway request duration in seconds"
    );
    describe_counter!(STORE_ERRORS_TOTAL, "Document store operation failures");
    describe_counter!(AUTH_FAILURES_TOTAL, "Requests rejected during authentication");
    describe_gauge!(REQUESTS_IN_FLIGHT, "Requests currently being served");
}

/// Records a completed request.
pub fn record_request(operation: &str, status: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION, "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

/// Records a store failure.
pub fn record_store_error(operation: &str, kind: &str) {
    counter!(
        STORE_ERRORS_TOTAL,
        "operation" => operation.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Records a rejected credential.
pub fn record_auth_failure(reason: &str) {
    counter!(AUTH_FAILURES_TOTAL, "reason" => reason.to_string()).increment(1);
}

/// Tracks one in-flight request until dropped.
#[derive(Debug)]
pub struct InFlightGuard(());

impl InFlightGuard {
    /// Increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(REQUESTS_IN_FLIGHT).increment(1.0);
        Self(())
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

/// Renders the current metrics in Prometheus text format.
///
/// Returns `None` when metrics were never initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_disabled() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert!(!config.duration_buckets.is_empty());
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            enabled: true,
            addr: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_record_functions_without_recorder() {
        record_request("get_one", 200, Duration::from_millis(3));
        record_store_error("delete_one", "not_found");
        record_auth_failure("missing_credential");
        drop(InFlightGuard::new());
    }
}
