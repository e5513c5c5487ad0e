//! Prometheus exposition endpoint.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

use super::OpsState;

/// Content type of the Prometheus text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub async fn metrics_handler(State(state): State<OpsState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], state.metrics.render())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use axum::body::to_bytes;
    use breakfast_core::{DurationSink, Observation};

    use super::*;
    use crate::network::ShutdownController;
    use crate::observability::{PrometheusDurations, REQUEST_DURATION};

    #[tokio::test]
    async fn renders_exposition() {
        let metrics = Arc::new(PrometheusDurations::new().unwrap());
        metrics.observe(Observation {
            component: "API",
            operation: "/".into(),
            success: false,
            elapsed: Duration::from_millis(2),
        });
        let state = OpsState {
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        };

        let response = metrics_handler(State(state)).await.into_response();
        assert_eq!(response.headers()[CONTENT_TYPE], EXPOSITION_CONTENT_TYPE);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(REQUEST_DURATION));
    }
}
