//! Prometheus metrics.
//!
//! The recorder is installed once per process; every router built afterwards
//! shares the same handle, so tests that build many routers keep working.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the global Prometheus recorder (idempotent) and return its handle.
pub fn init() -> Option<PrometheusHandle> {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Prometheus recorder not installed: {}", e);
                None
            }
        })
        .clone()
}

/// Render the current metrics in Prometheus text format.
pub fn render() -> String {
    HANDLE
        .get()
        .and_then(|h| h.as_ref())
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Count a finished request for `endpoint` with its response status.
pub fn record_request(endpoint: &'static str, status: u16) {
    metrics::counter!(
        "hls_relay_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record handler latency since `start`.
pub fn record_duration(endpoint: &'static str, start: Instant) {
    metrics::histogram!("hls_relay_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error() {
    metrics::counter!("hls_relay_upstream_errors_total").increment(1);
}

pub fn record_playlist_rewrite() {
    metrics::counter!("hls_relay_playlists_rewritten_total").increment(1);
}
