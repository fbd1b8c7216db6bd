//! Prometheus metrics
//!
//! Counters are process-wide. They are recorded through the `metrics` facade,
//! so until [`init_metrics`] installs the exporter every call is a no-op.
//!
//! # Metrics
//!
//! * `swap_rate_resolutions_total{origin}` - prices served, by cache/live/last_good
//! * `swap_rate_failures_total{reason}` - resolutions that failed
//! * `swap_orders_created_total{pricing}` - orders created, by live or default price
//! * `swap_limit_denials_total{limit}` - orders refused by the limit policy
//! * `swap_status_transitions_total{from,to}` - committed status changes
//! * `swap_settlements_total{outcome}` - debit attempts, by outcome
//! * `swap_http_requests_total{server,status}` / `swap_http_request_duration_seconds{server}`

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, histogram, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus exporter
///
/// Starts an HTTP listener on `port` serving `/metrics`.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new().with_http_listener(addr).install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

pub fn record_rate_resolution(origin: &'static str) {
    counter!("swap_rate_resolutions_total", "origin" => origin).increment(1);
}

pub fn record_rate_failure(reason: &'static str) {
    counter!("swap_rate_failures_total", "reason" => reason).increment(1);
}

pub fn record_order_created(pricing: &'static str) {
    counter!("swap_orders_created_total", "pricing" => pricing).increment(1);
}

pub fn record_limit_denial(limit: &'static str) {
    counter!("swap_limit_denials_total", "limit" => limit).increment(1);
}

pub fn record_status_transition(from: &'static str, to: &'static str) {
    counter!("swap_status_transitions_total", "from" => from, "to" => to).increment(1);
}

pub fn record_settlement(outcome: &'static str) {
    counter!("swap_settlements_total", "outcome" => outcome).increment(1);
}

/// Request metrics for one HTTP server
#[derive(Clone)]
pub struct HttpMetrics {
    server_name: String,
    request_duration: Histogram,
}

impl HttpMetrics {
    pub fn new(server_name: &str) -> Self {
        Self {
            server_name: server_name.to_string(),
            request_duration: histogram!(
                "swap_http_request_duration_seconds",
                "server" => server_name.to_string()
            ),
        }
    }

    /// Record a completed request
    pub fn record_request(&self, duration: Duration, status_code: u16) {
        counter!(
            "swap_http_requests_total",
            "server" => self.server_name.clone(),
            "status" => status_code.to_string()
        )
        .increment(1);
        self.request_duration.record(duration.as_secs_f64());
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

/// Records request duration when dropped
///
/// ```ignore
/// let mut guard = RequestMetricsGuard::new(&metrics);
/// let response = next.run(request).await;
/// guard.set_status(response.status().as_u16());
/// ```
pub struct RequestMetricsGuard<'a> {
    metrics: &'a HttpMetrics,
    start: Instant,
    status_code: u16,
}

impl<'a> RequestMetricsGuard<'a> {
    pub fn new(metrics: &'a HttpMetrics) -> Self {
        Self {
            metrics,
            start: Instant::now(),
            status_code: 500,
        }
    }

    /// Set the status code; a guard dropped without one records 500
    pub fn set_status(&mut self, code: u16) {
        self.status_code = code;
    }
}

impl Drop for RequestMetricsGuard<'_> {
    fn drop(&mut self) {
        self.metrics.record_request(self.start.elapsed(), self.status_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        record_rate_resolution("cache");
        record_settlement("settled");
        record_status_transition("paid", "processing");

        let metrics = HttpMetrics::new("http");
        assert_eq!(metrics.server_name(), "http");
        let mut guard = RequestMetricsGuard::new(&metrics);
        guard.set_status(200);
    }
}
