//! Tracing decorator for all four extension points.
//!
//! Opens a child of `state.span()` at entry, installs it as the request's
//! current span while the inner call runs, and annotates it with an event
//! at the span's level on exit. The span closes before the decorator returns, so children
//! always close before their parent.

use std::time::Duration;

use async_trait::async_trait;
use breakfast_core::{
    took, Breakfast, Postprocessor, Preprocessor, Repository, RepositoryError, RequestState,
    Stopwatch,
};
use tower::Layer;
use tracing::{info_span, Instrument, Span};

use crate::service::labels::operation;
use crate::service::request::ApiRequest;
use crate::service::writer::InterceptingWriter;
use crate::traits::{ApiHandler, ResponseWriter};

// ---------------------------------------------------------------------------
// TracingLayer
// ---------------------------------------------------------------------------

/// Tower layer producing [`Traced`] stages and handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLayer;

impl<S> Layer<S> for TracingLayer {
    type Service = Traced<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Traced { inner }
    }
}

// ---------------------------------------------------------------------------
// Traced
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Traced<S> {
    inner: S,
}

/// Swaps `span` in as the request's current span, returning the parent to
/// restore afterwards.
fn enter(state: &mut RequestState, span: &Span) -> Span {
    state.replace_span(span.clone())
}

fn secs(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64()
}

fn annotate_db(
    span: &Span,
    method: &'static str,
    username: &str,
    breakfast_id: Option<u64>,
    elapsed: Duration,
    result: &Result<Breakfast, RepositoryError>,
) {
    tracing::info!(
        parent: span,
        method,
        username,
        breakfast_id,
        took = %took(elapsed),
        sec = secs(elapsed),
        success = result.is_ok(),
        returned_breakfast_id = result.as_ref().ok().map(|b| b.id),
        err = result.as_ref().err().map(tracing::field::display),
        "db_request finished"
    );
}

#[async_trait]
impl<S: ApiHandler> ApiHandler for Traced<S> {
    async fn serve(
        &self,
        state: &mut RequestState,
        request: &ApiRequest,
        writer: &mut dyn ResponseWriter,
    ) {
        let span = info_span!(parent: state.span(), "api_request");
        let sw = Stopwatch::start();
        let mut iw = InterceptingWriter::new(writer);

        let parent = enter(state, &span);
        self.inner
            .serve(state, request, &mut iw)
            .instrument(span.clone())
            .await;
        state.replace_span(parent);

        let elapsed = sw.elapsed();
        let status = iw.status();
        tracing::info!(
            parent: &span,
            remote_addr = %request.remote_addr(),
            method = %request.method(),
            url = %request.uri(),
            content_length = request.content_length(),
            status_code = status.as_u16(),
            status_text = status.canonical_reason().unwrap_or(""),
            response_size = iw.bytes_written(),
            took = %took(elapsed),
            sec = secs(elapsed),
            "api_request finished"
        );
    }
}

#[async_trait]
impl<S: Preprocessor> Preprocessor for Traced<S> {
    async fn preprocess(&self, state: &mut RequestState, region: &str) {
        let span = info_span!(parent: state.span(), "preprocess");
        let sw = Stopwatch::start();

        let parent = enter(state, &span);
        self.inner
            .preprocess(state, region)
            .instrument(span.clone())
            .await;
        state.replace_span(parent);

        let elapsed = sw.elapsed();
        tracing::info!(
            parent: &span,
            region,
            took = %took(elapsed),
            sec = secs(elapsed),
            "preprocess finished"
        );
    }
}

#[async_trait]
impl<S: Repository> Repository for Traced<S> {
    async fn get_by_id(
        &self,
        state: &mut RequestState,
        username: &str,
        id: u64,
    ) -> Result<Breakfast, RepositoryError> {
        let span = info_span!(parent: state.span(), "db_request");
        let sw = Stopwatch::start();

        let parent = enter(state, &span);
        let result = self
            .inner
            .get_by_id(state, username, id)
            .instrument(span.clone())
            .await;
        state.replace_span(parent);

        annotate_db(
            &span,
            operation::GET_BREAKFAST,
            username,
            Some(id),
            sw.elapsed(),
            &result,
        );
        result
    }

    async fn get_random(
        &self,
        state: &mut RequestState,
        username: &str,
    ) -> Result<Breakfast, RepositoryError> {
        let span = info_span!(parent: state.span(), "db_request");
        let sw = Stopwatch::start();

        let parent = enter(state, &span);
        let result = self
            .inner
            .get_random(state, username)
            .instrument(span.clone())
            .await;
        state.replace_span(parent);

        annotate_db(
            &span,
            operation::GET_RANDOM_BREAKFAST,
            username,
            None,
            sw.elapsed(),
            &result,
        );
        result
    }
}

#[async_trait]
impl<S: Postprocessor> Postprocessor for Traced<S> {
    async fn postprocess(&self, state: &mut RequestState, username: &str, success: bool) {
        let span = info_span!(parent: state.span(), "postprocess");
        let sw = Stopwatch::start();

        let parent = enter(state, &span);
        self.inner
            .postprocess(state, username, success)
            .instrument(span.clone())
            .await;
        state.replace_span(parent);

        let elapsed = sw.elapsed();
        tracing::info!(
            parent: &span,
            username,
            success,
            took = %took(elapsed),
            sec = secs(elapsed),
            "postprocess finished"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
