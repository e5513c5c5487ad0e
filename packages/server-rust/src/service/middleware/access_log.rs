//! HTTP access-log decorator.
//!
//! Seeds the request's log accumulator with request fields, serves through
//! an [`InterceptingWriter`], appends response fields, and flushes the whole
//! accumulator to the configured [`AccessLog`] exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use breakfast_core::{took, RequestState, Stopwatch};
use tower::Layer;

use crate::observability::AccessLog;
use crate::service::request::ApiRequest;
use crate::service::writer::InterceptingWriter;
use crate::traits::{ApiHandler, ResponseWriter};

/// Tower layer producing [`AccessLogged`] handlers that flush to `sink`.
#[derive(Clone)]
pub struct AccessLogLayer {
    sink: Arc<dyn AccessLog>,
}

impl AccessLogLayer {
    #[must_use]
    pub fn new(sink: Arc<dyn AccessLog>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogged<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogged {
            inner,
            sink: Arc::clone(&self.sink),
        }
    }
}

pub struct AccessLogged<S> {
    inner: S,
    sink: Arc<dyn AccessLog>,
}

#[async_trait]
impl<S: ApiHandler> ApiHandler for AccessLogged<S> {
    async fn serve(
        &self,
        state: &mut RequestState,
        request: &ApiRequest,
        writer: &mut dyn ResponseWriter,
    ) {
        let sw = Stopwatch::start();
        {
            let log = state.log();
            log.push("http_req_id", request.request_id().unwrap_or_default());
            log.push("http_req_remoteaddr", request.remote_addr());
            log.push("http_req_method", request.method().as_str());
            log.push("http_req_url", request.url());
            log.push("http_req_contentlength", request.content_length());
        }

        let mut iw = InterceptingWriter::new(writer);
        self.inner.serve(state, request, &mut iw).await;
        let elapsed = sw.elapsed();
        let status = iw.status();

        let log = state.log();
        log.push("http_resp_statuscode", status.as_u16());
        log.push("http_resp_statustext", status.canonical_reason().unwrap_or(""));
        log.push("http_resp_size", iw.bytes_written());
        log.push("http_resp_took", took(elapsed));
        log.push("http_resp_sec", elapsed.as_secs_f64());

        let fields = state.take_log();
        self.sink.emit(&fields);
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
    use breakfast_core::{LogValue, Repository};

    use super::*;
    use crate::service::middleware::logging::LoggingLayer;
    use crate::service::repository::JsonRepository;
    use crate::service::writer::{write_error, BufferedResponse};
    use crate::testing::{breakfasts, state, MemoryAccessLog, RecordingSink};

    /// Handler that runs a logged lookup for the id in the query.
    struct Lookup<R>(R);

    #[async_trait]
    impl<R: Repository> ApiHandler for Lookup<R> {
        async fn serve(
            &self,
            state: &mut RequestState,
            request: &ApiRequest,
            writer: &mut dyn ResponseWriter,
        ) {
            let id = request.query("id").and_then(|v| v.parse().ok()).unwrap_or(0);
            match self.0.get_by_id(state, request.username(), id).await {
                Ok(b) => {
                    writer.write(b.name.as_bytes());
                }
                Err(e) => write_error(writer, StatusCode::NOT_FOUND, &e.to_string()),
            }
        }
    }

    fn handler(sink: &Arc<MemoryAccessLog>) -> AccessLogged<Lookup<impl Repository>> {
        let repo = LoggingLayer.layer(JsonRepository::from_records(breakfasts(), false));
        AccessLogLayer::new(Arc::clone(sink) as Arc<dyn AccessLog>).layer(Lookup(repo))
    }

    #[tokio::test]
    async fn one_entry_with_request_stage_and_response_fields() {
        let sink = MemoryAccessLog::new();
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        let request = ApiRequest::new(
            Method::GET,
            "/lookup?id=42&username=alice".parse().unwrap(),
            headers,
            Some("10.0.0.1:5555".parse().unwrap()),
        );
        let mut state = state(&RecordingSink::new());
        let mut response = BufferedResponse::new();

        handler(&sink).serve(&mut state, &request, &mut response).await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.get("http_req_id"), Some(&LogValue::from("req-1")));
        assert_eq!(
            entry.get("http_req_remoteaddr"),
            Some(&LogValue::from("10.0.0.1:5555"))
        );
        assert_eq!(entry.get("http_req_method"), Some(&LogValue::from("GET")));
        assert_eq!(
            entry.get("http_req_url"),
            Some(&LogValue::from("/lookup?id=42&username=alice"))
        );
        assert_eq!(entry.get("db_username"), Some(&LogValue::from("alice")));
        assert_eq!(entry.get("http_resp_statuscode"), Some(&LogValue::Uint(200)));
        assert_eq!(entry.get("http_resp_statustext"), Some(&LogValue::from("OK")));
        assert_eq!(entry.get("http_resp_size"), Some(&LogValue::Uint(8)));
        assert!(entry.get("http_resp_sec").and_then(LogValue::as_f64).is_some());

        // Request fields precede stage fields, which precede response fields.
        let keys: Vec<&str> = entry.entries().map(|(k, _)| k).collect();
        let pos = |key: &str| keys.iter().position(|k| *k == key).unwrap();
        assert!(pos("http_req_id") < pos("db_method"));
        assert!(pos("db_method") < pos("http_resp_statuscode"));

        assert!(state.log_fields().is_empty());
    }

    #[tokio::test]
    async fn failure_status_and_error_recorded() {
        let sink = MemoryAccessLog::new();
        let request = ApiRequest::new(
            Method::GET,
            "/lookup?id=5".parse().unwrap(),
            HeaderMap::new(),
            None,
        );
        let mut state = state(&RecordingSink::new());

        handler(&sink)
            .serve(&mut state, &request, &mut BufferedResponse::new())
            .await;

        let entry = &sink.entries()[0];
        assert_eq!(entry.get("http_req_id"), Some(&LogValue::from("")));
        assert_eq!(entry.get("http_resp_statuscode"), Some(&LogValue::Uint(404)));
        assert_eq!(
            entry.get("http_resp_statustext"),
            Some(&LogValue::from("Not Found"))
        );
        assert_eq!(entry.get("db_username"), Some(&LogValue::from("<anonymous>")));
        assert_eq!(
            entry.get("db_err"),
            Some(&LogValue::from("no breakfast with ID 5"))
        );
    }
}
