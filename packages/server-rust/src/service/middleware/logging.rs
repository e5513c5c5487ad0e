//! Logging decorator for the stage extension points.
//!
//! Appends each stage's fields to the request's log accumulator once the
//! inner call returns. Nothing is emitted here; the HTTP access-log decorator
//! flushes the accumulator when the request completes.

use std::time::Duration;

use async_trait::async_trait;
use breakfast_core::{
    took, Breakfast, LogFields, Postprocessor, Preprocessor, Repository, RepositoryError,
    RequestState, Stopwatch,
};
use tower::Layer;

use crate::service::labels::operation;

// ---------------------------------------------------------------------------
// LoggingLayer
// ---------------------------------------------------------------------------

/// Tower layer producing [`Logged`] stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = Logged<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logged { inner }
    }
}

// ---------------------------------------------------------------------------
// Logged
// ---------------------------------------------------------------------------

/// Stage wrapper that records method, inputs, timing, and outcome in the
/// log accumulator.
#[derive(Debug, Clone)]
pub struct Logged<S> {
    inner: S,
}

fn push_timing(
    log: &mut LogFields,
    took_key: &'static str,
    sec_key: &'static str,
    elapsed: Duration,
) {
    log.push(took_key, took(elapsed));
    log.push(sec_key, elapsed.as_secs_f64());
}

fn push_db_outcome(log: &mut LogFields, result: &Result<Breakfast, RepositoryError>) {
    log.push("db_success", result.is_ok());
    log.push("db_returned_breakfast_id", result.as_ref().ok().map(|b| b.id));
    log.push("db_err", result.as_ref().err().map(ToString::to_string));
}

#[async_trait]
impl<S: Preprocessor> Preprocessor for Logged<S> {
    async fn preprocess(&self, state: &mut RequestState, region: &str) {
        let sw = Stopwatch::start();
        self.inner.preprocess(state, region).await;
        let elapsed = sw.elapsed();

        let log = state.log();
        log.push("preprocess_region", region);
        log.push("preprocess_success", true);
        push_timing(log, "preprocess_took", "preprocess_sec", elapsed);
    }
}

#[async_trait]
impl<S: Repository> Repository for Logged<S> {
    async fn get_by_id(
        &self,
        state: &mut RequestState,
        username: &str,
        id: u64,
    ) -> Result<Breakfast, RepositoryError> {
        let sw = Stopwatch::start();
        let result = self.inner.get_by_id(state, username, id).await;
        let elapsed = sw.elapsed();

        let log = state.log();
        log.push("db_method", operation::GET_BREAKFAST);
        log.push("db_username", username);
        log.push("db_breakfast_id", id);
        push_timing(log, "db_took", "db_sec", elapsed);
        push_db_outcome(log, &result);
        result
    }

    async fn get_random(
        &self,
        state: &mut RequestState,
        username: &str,
    ) -> Result<Breakfast, RepositoryError> {
        let sw = Stopwatch::start();
        let result = self.inner.get_random(state, username).await;
        let elapsed = sw.elapsed();

        let log = state.log();
        log.push("db_method", operation::GET_RANDOM_BREAKFAST);
        log.push("db_username", username);
        push_timing(log, "db_took", "db_sec", elapsed);
        push_db_outcome(log, &result);
        result
    }
}

#[async_trait]
impl<S: Postprocessor> Postprocessor for Logged<S> {
    async fn postprocess(&self, state: &mut RequestState, username: &str, success: bool) {
        let sw = Stopwatch::start();
        self.inner.postprocess(state, username, success).await;
        let elapsed = sw.elapsed();

        let log = state.log();
        log.push("postprocess_username", username);
        log.push("postprocess_success", success);
        push_timing(log, "postprocess_took", "postprocess_sec", elapsed);
    }
}
