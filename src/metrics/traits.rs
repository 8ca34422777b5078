//! MetricsRecorder trait for dependency injection

use std::fmt;
use std::sync::Arc;

/// Failure branches counted by `inc_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadIp,
    WebFetch,
    DbWrite,
    DbRead,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadIp => "bad_ip",
            ErrorKind::WebFetch => "web_fetch_error",
            ErrorKind::DbWrite => "db_write_error",
            ErrorKind::DbRead => "db_read_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for recording request metrics.
///
/// All methods are no-op by default. Implementations must be safe to call
/// from many requests at once.
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync {
    /// Count a finished request by route and response status
    fn inc_request(&self, route: &str, status: u16) {}

    /// Observe how long a request took
    fn observe_latency(&self, route: &str, duration_secs: f64) {}

    /// Count a failure branch
    fn inc_error(&self, route: &str, kind: ErrorKind) {}

    /// Render everything recorded so far in the Prometheus text format
    fn export(&self) -> String {
        String::new()
    }
}

/// Recorder that drops everything.
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {}

impl NoopMetrics {
    pub fn arc() -> Arc<dyn MetricsRecorder> {
        Arc::new(Self)
    }
}
