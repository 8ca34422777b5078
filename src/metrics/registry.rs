use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

use super::traits::{ErrorKind, MetricsRecorder};

/// Prometheus-backed recorder with its own registry.
pub struct PrometheusMetrics {
    registry: Registry,
    /// Finished requests by path and status code
    requests_total: IntCounterVec,
    /// Request latency by path
    request_duration: HistogramVec,
    /// Failure branches by path and error kind
    webservice_errors_total: IntCounterVec,
}

impl PrometheusMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "http_requests_total",
                "Total number of requests handled by the server",
            ),
            &["path", "status"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Histogram of response durations",
            ),
            &["path"],
        )?;

        let webservice_errors_total = IntCounterVec::new(
            Opts::new(
                "http_request_webservice_errors_total",
                "Errors inside the webservice when handling an http request",
            ),
            &["path", "error"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(webservice_errors_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            webservice_errors_total,
        })
    }

    pub fn request_count(&self, route: &str, status: u16) -> u64 {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[route, status.as_str()])
            .get()
    }

    pub fn error_count(&self, route: &str, kind: ErrorKind) -> u64 {
        self.webservice_errors_total
            .with_label_values(&[route, kind.as_str()])
            .get()
    }

    pub fn latency_samples(&self, route: &str) -> u64 {
        self.request_duration
            .with_label_values(&[route])
            .get_sample_count()
    }

    fn encode(&self) -> Result<String, Box<dyn std::error::Error>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl MetricsRecorder for PrometheusMetrics {
    fn inc_request(&self, route: &str, status: u16) {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[route, status.as_str()])
            .inc();
    }

    fn observe_latency(&self, route: &str, duration_secs: f64) {
        self.request_duration
            .with_label_values(&[route])
            .observe(duration_secs);
    }

    fn inc_error(&self, route: &str, kind: ErrorKind) {
        self.webservice_errors_total
            .with_label_values(&[route, kind.as_str()])
            .inc();
    }

    fn export(&self) -> String {
        self.encode().unwrap_or_else(|e| {
            error!("Failed to encode metrics: {}", e);
            String::new()
        })
    }
}
