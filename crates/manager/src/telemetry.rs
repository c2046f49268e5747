use std::net::SocketAddr;
use std::str::FromStr;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

pub const RECONCILE_TOTAL: &str = "reconcile_total";
pub const RECONCILE_ERRORS_TOTAL: &str = "reconcile_errors_total";
pub const EXTERNAL_CALL_LATENCY_MS: &str = "external_call_latency_ms";

/// Global subscriber filtered by `ARGONAUT_LOG` (default `info`).
pub fn init_tracing() {
    let env = std::env::var("ARGONAUT_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::from_str(&env).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Prometheus exporter on `ARGONAUT_METRICS_ADDR` when set. Returns whether
/// an exporter is running.
pub fn init_metrics() -> bool {
    let Ok(addr) = std::env::var("ARGONAUT_METRICS_ADDR") else { return false };
    let Ok(sock) = addr.parse::<SocketAddr>() else {
        tracing::warn!(addr = %addr, "invalid ARGONAUT_METRICS_ADDR; expected host:port");
        return false;
    };
    match PrometheusBuilder::new().with_http_listener(sock).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(addr = %addr, "Prometheus metrics exporter listening");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to install metrics exporter");
            false
        }
    }
}

/// Help text for the series the controllers record, labelled by `kind`
/// (and `operation` for call latency).
pub fn describe_metrics() {
    describe_counter!(RECONCILE_TOTAL, "Reconcile passes started per managed kind");
    describe_counter!(RECONCILE_ERRORS_TOTAL, "Reconcile passes that ended in an error");
    describe_histogram!(
        EXTERNAL_CALL_LATENCY_MS,
        Unit::Milliseconds,
        "Latency of Argo CD observe, create, update and delete calls"
    );
}
