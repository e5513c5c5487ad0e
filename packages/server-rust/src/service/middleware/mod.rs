//! Decorators for the pipeline extension points, composed as tower layers.
//!
//! - [`logging`]: appends stage fields to the request's log accumulator
//! - [`metrics`]: records one duration observation per call
//! - [`trace`]: opens a child span per call and annotates it at exit
//! - [`access_log`]: flushes the accumulator once per HTTP request
//! - [`pipeline`]: wraps each extension point in its decorator stack

pub mod access_log;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod trace;

pub use access_log::AccessLogLayer;
pub use logging::LoggingLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_api, instrument_api};
pub use trace::TracingLayer;
