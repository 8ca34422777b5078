//! Request metrics
//!
//! The recorder is built once at startup and injected wherever requests are handled.

mod registry;
mod traits;

pub use registry::PrometheusMetrics;
pub use traits::{ErrorKind, MetricsRecorder, NoopMetrics};
