//! Status reporting to the external store and Prometheus metrics.

pub mod metrics;
pub mod status;

pub use metrics::{Metrics, MetricsServer};
pub use status::{HttpStatusReporter, ProgressUpdate, StatusSink};
