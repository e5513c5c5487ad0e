//! The single axum entry point of the API listener.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use breakfast_core::RequestState;

use super::AppState;
use crate::service::{ApiRequest, BufferedResponse};

/// Serves every API path: builds the request's `RequestState`, runs the
/// instrumented handler stack against a buffered writer, and converts the
/// result into an axum response.
///
/// The stack runs on its own task. A client disconnect drops only this
/// future, so every decorator still records and the access log still
/// flushes.
pub async fn api_handler(State(state): State<AppState>, request: Request) -> Response {
    let guard = state.shutdown.in_flight_guard();

    let (parts, _body) = request.into_parts();
    let request = ApiRequest::from_parts(&parts);
    let task = tokio::spawn(async move {
        let _guard = guard;
        let mut request_state = RequestState::new(state.durations.clone());
        let mut response = BufferedResponse::new();
        state
            .handler
            .serve(&mut request_state, &request, &mut response)
            .await;
        response
    });

    match task.await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use breakfast_core::{DurationSink, LogValue};

    use super::*;
    use crate::network::ShutdownController;
    use crate::observability::AccessLog;
    use crate::service::{build_api, JsonRepository, ServiceConfig};
    use crate::testing::{breakfasts, MemoryAccessLog, RecordingSink};

    fn app(simulate_latency: bool) -> (AppState, Arc<MemoryAccessLog>, Arc<RecordingSink>) {
        let log = MemoryAccessLog::new();
        let sink = RecordingSink::new();
        let config = ServiceConfig {
            simulate_latency,
            ..ServiceConfig::default()
        };
        let handler = build_api(
            &config,
            JsonRepository::from_records(breakfasts(), simulate_latency),
            Arc::clone(&log) as Arc<dyn AccessLog>,
        );
        let state = AppState {
            handler,
            durations: Arc::clone(&sink) as Arc<dyn DurationSink>,
            shutdown: Arc::new(ShutdownController::new()),
        };
        (state, log, sink)
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn serves_through_handler_stack() {
        let (state, log, sink) = app(false);
        let response = api_handler(State(state.clone()), get("/breakfasts/42")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(log.entries().len(), 1);
        assert_eq!(sink.count("API", "/breakfasts", true), 1);
        assert_eq!(state.shutdown.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_request_still_records_everything() {
        let (state, log, sink) = app(true);

        // Region au holds the preprocessor for 100 ms, past the deadline.
        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            api_handler(
                State(state.clone()),
                get("/breakfasts/42?username=kate&region=au"),
            ),
        )
        .await
        .is_err();
        assert!(cancelled);
        assert_eq!(state.shutdown.in_flight_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].get("http_resp_statuscode"),
            Some(&LogValue::Uint(200))
        );
        assert_eq!(sink.count("preprocessor", "preprocess", true), 1);
        assert_eq!(sink.count("DB", "getBreakfast", true), 1);
        assert_eq!(sink.count("postprocessor", "postprocess", true), 1);
        assert_eq!(sink.count("API", "/breakfasts", true), 1);
        assert_eq!(state.shutdown.in_flight_count(), 0);
    }
}
