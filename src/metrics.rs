//! Prometheus metrics for relay traffic.
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed with [`install_exporter`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use strum::{Display, IntoStaticStr};
use tracing::{debug, info};

use crate::error::ProxyError;

// === Metric Name Constants ===

/// Relay requests counter metric name.
pub const METRIC_RELAY_REQUESTS: &str = "relay_requests_total";
/// Upstream call latency metric name.
pub const METRIC_UPSTREAM_LATENCY: &str = "upstream_latency_ms";
/// Health checks counter metric name.
pub const METRIC_HEALTH_CHECKS: &str = "health_checks_total";

/// How a relay request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RelayOutcome {
    /// Upstream answered 2xx.
    Success,
    /// Upstream answered non-2xx; relayed as-is.
    UpstreamError,
    /// Rejected locally before any upstream call.
    Rejected,
    /// Transport or parse failure.
    Failed,
}

/// Initialize all metric descriptions.
pub fn init_metrics() {
    describe_counter!(
        METRIC_RELAY_REQUESTS,
        "Total relay requests, labelled by outcome"
    );
    describe_histogram!(
        METRIC_UPSTREAM_LATENCY,
        "Upstream generateContent latency in milliseconds"
    );
    describe_counter!(METRIC_HEALTH_CHECKS, "Total health check requests");

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder with an HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn install_exporter(port: u16) -> Result<(), ProxyError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ProxyError::InvalidConfig(format!("metrics exporter: {e}")))?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

/// Increment relay requests counter.
pub fn inc_relay_requests(outcome: RelayOutcome) {
    let outcome: &'static str = outcome.into();
    counter!(METRIC_RELAY_REQUESTS, "outcome" => outcome).increment(1);
}

/// Increment health checks counter.
pub fn inc_health_checks() {
    counter!(METRIC_HEALTH_CHECKS).increment(1);
}

/// Label recorded for any model other than the configured default.
pub const OTHER_MODEL_LABEL: &str = "other";

/// Bounded `model` label: the default model keeps its name, callers' picks
/// collapse to [`OTHER_MODEL_LABEL`].
pub fn model_label<'a>(model: &str, default_model: &'a str) -> &'a str {
    if model == default_model {
        default_model
    } else {
        OTHER_MODEL_LABEL
    }
}

/// RAII guard for timing operations.
/// Records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
    model: String,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric and model label.
    pub fn new(metric_name: &'static str, model: &str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
            model: model.to_string(),
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.elapsed_ms();
        histogram!(self.metric_name, "model" => std::mem::take(&mut self.model)).record(latency_ms);
    }
}

/// Create a latency timer for an upstream call.
pub fn timer_upstream(model: &str, default_model: &str) -> LatencyTimer {
    LatencyTimer::new(METRIC_UPSTREAM_LATENCY, model_label(model, default_model))
}
