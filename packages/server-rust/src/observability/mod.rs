//! Observability backends: access-log sinks, the Prometheus duration
//! histogram, and console telemetry setup.

pub mod access_log;
pub mod prometheus;
pub mod telemetry;

pub use access_log::{
    AccessLog, AccessLogTarget, JsonLinesAccessLog, NopAccessLog, OpenAccessLog, TracingAccessLog,
};
pub use prometheus::{MetricsError, PrometheusDurations, REQUEST_DURATION};
pub use telemetry::LogFormat;
