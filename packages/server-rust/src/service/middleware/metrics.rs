//! Metrics decorator for all four extension points.
//!
//! Each call records one observation into the request's duration sink,
//! labeled by component, operation, and outcome.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use breakfast_core::{
    Breakfast, Observation, Postprocessor, Preprocessor, Repository, RepositoryError,
    RequestState, Stopwatch,
};
use tower::Layer;

use crate::service::labels::{api_operation, api_success, component, operation};
use crate::service::request::ApiRequest;
use crate::service::writer::InterceptingWriter;
use crate::traits::{ApiHandler, ResponseWriter};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer producing [`Measured`] stages and handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = Measured<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Measured { inner }
    }
}

// ---------------------------------------------------------------------------
// Measured
// ---------------------------------------------------------------------------

/// Wrapper that times the inner call and reports it to `state.metrics()`.
#[derive(Debug, Clone)]
pub struct Measured<S> {
    inner: S,
}

fn record(
    state: &RequestState,
    component: &'static str,
    operation: impl Into<Cow<'static, str>>,
    success: bool,
    elapsed: Duration,
) {
    state.metrics().observe(Observation {
        component,
        operation: operation.into(),
        success,
        elapsed,
    });
}

#[async_trait]
impl<S: ApiHandler> ApiHandler for Measured<S> {
    async fn serve(
        &self,
        state: &mut RequestState,
        request: &ApiRequest,
        writer: &mut dyn ResponseWriter,
    ) {
        let sw = Stopwatch::start();
        let mut iw = InterceptingWriter::new(writer);
        self.inner.serve(state, request, &mut iw).await;
        let elapsed = sw.elapsed();
        record(
            state,
            component::API,
            api_operation(request.path()),
            api_success(iw.status()),
            elapsed,
        );
    }
}

#[async_trait]
impl<S: Preprocessor> Preprocessor for Measured<S> {
    async fn preprocess(&self, state: &mut RequestState, region: &str) {
        let sw = Stopwatch::start();
        self.inner.preprocess(state, region).await;
        record(
            state,
            component::PREPROCESSOR,
            operation::PREPROCESS,
            true,
            sw.elapsed(),
        );
    }
}

#[async_trait]
impl<S: Repository> Repository for Measured<S> {
    async fn get_by_id(
        &self,
        state: &mut RequestState,
        username: &str,
        id: u64,
    ) -> Result<Breakfast, RepositoryError> {
        let sw = Stopwatch::start();
        let result = self.inner.get_by_id(state, username, id).await;
        record(
            state,
            component::DB,
            operation::GET_BREAKFAST,
            result.is_ok(),
            sw.elapsed(),
        );
        result
    }

    async fn get_random(
        &self,
        state: &mut RequestState,
        username: &str,
    ) -> Result<Breakfast, RepositoryError> {
        let sw = Stopwatch::start();
        let result = self.inner.get_random(state, username).await;
        record(
            state,
            component::DB,
            operation::GET_RANDOM_BREAKFAST,
            result.is_ok(),
            sw.elapsed(),
        );
        result
    }
}

#[async_trait]
impl<S: Postprocessor> Postprocessor for Measured<S> {
    async fn postprocess(&self, state: &mut RequestState, username: &str, success: bool) {
        let sw = Stopwatch::start();
        self.inner.postprocess(state, username, success).await;
        record(
            state,
            component::POSTPROCESSOR,
            operation::POSTPROCESS,
            success,
            sw.elapsed(),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
