//! Pipeline composition: wraps each extension point with its decorators.

use std::sync::Arc;

use breakfast_core::{Postprocessor, Preprocessor, Repository};
use tower::ServiceBuilder;

use super::access_log::AccessLogLayer;
use super::logging::LoggingLayer;
use super::metrics::MetricsLayer;
use super::trace::TracingLayer;
use crate::observability::AccessLog;
use crate::service::api::Api;
use crate::service::config::ServiceConfig;
use crate::service::postprocess::BackpressurePostprocessor;
use crate::service::preprocess::GeoPreprocessor;
use crate::service::repository::JsonRepository;
use crate::traits::ApiHandler;

/// Wraps a preprocessor with logging, metrics, and tracing (outermost first).
pub fn instrument_preprocessor<P>(base: P) -> Arc<dyn Preprocessor>
where
    P: Preprocessor + 'static,
{
    Arc::new(
        ServiceBuilder::new()
            .layer(LoggingLayer)
            .layer(MetricsLayer)
            .layer(TracingLayer)
            .service(base),
    )
}

/// Wraps a repository with logging, metrics, and tracing (outermost first).
pub fn instrument_repository<R>(base: R) -> Arc<dyn Repository>
where
    R: Repository + 'static,
{
    Arc::new(
        ServiceBuilder::new()
            .layer(LoggingLayer)
            .layer(MetricsLayer)
            .layer(TracingLayer)
            .service(base),
    )
}

/// Wraps a postprocessor with logging, metrics, and tracing (outermost first).
pub fn instrument_postprocessor<P>(base: P) -> Arc<dyn Postprocessor>
where
    P: Postprocessor + 'static,
{
    Arc::new(
        ServiceBuilder::new()
            .layer(LoggingLayer)
            .layer(MetricsLayer)
            .layer(TracingLayer)
            .service(base),
    )
}

/// Wraps an HTTP handler with access logging, metrics, and tracing.
///
/// The access log sits outermost so its flush happens after every inner
/// decorator has appended its fields.
pub fn instrument_api<H>(base: H, access_log: Arc<dyn AccessLog>) -> Arc<dyn ApiHandler>
where
    H: ApiHandler + 'static,
{
    Arc::new(
        ServiceBuilder::new()
            .layer(AccessLogLayer::new(access_log))
            .layer(MetricsLayer)
            .layer(TracingLayer)
            .service(base),
    )
}

/// Assembles the fully instrumented request handler from the base stages.
#[must_use]
pub fn build_api(
    config: &ServiceConfig,
    repository: JsonRepository,
    access_log: Arc<dyn AccessLog>,
) -> Arc<dyn ApiHandler> {
    let api = Api::new(
        instrument_preprocessor(GeoPreprocessor::new(config.simulate_latency)),
        instrument_repository(repository),
        instrument_postprocessor(BackpressurePostprocessor::new(config.simulate_latency)),
        &config.image_dir,
    )
    .with_max_image_bytes(config.max_image_bytes);
    instrument_api(api, access_log)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
