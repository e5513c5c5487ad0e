//! Response writers: the buffered writer handed to the handler stack by the
//! axum entry point, and the interception shim each HTTP decorator wraps
//! around the writer it receives.

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

use crate::traits::ResponseWriter;

// ---------------------------------------------------------------------------
// BufferedResponse
// ---------------------------------------------------------------------------

/// Collects status, headers, and body in memory until converted into an
/// axum [`Response`].
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl BufferedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed status, or `200 OK` if none was set.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.write_header(StatusCode::OK);
        self.body.extend_from_slice(buf);
        buf.len()
    }
}

// ---------------------------------------------------------------------------
// InterceptingWriter
// ---------------------------------------------------------------------------

/// Pass-through writer recording the first status set and the total number
/// of body bytes offered to `write`.
pub struct InterceptingWriter<'a> {
    inner: &'a mut dyn ResponseWriter,
    status: Option<StatusCode>,
    bytes: usize,
}

impl<'a> InterceptingWriter<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter) -> Self {
        Self {
            inner,
            status: None,
            bytes: 0,
        }
    }

    /// First status observed, `200 OK` if the handler never set one.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.bytes
    }
}

impl ResponseWriter for InterceptingWriter<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.bytes += buf.len();
        self.inner.write(buf)
    }
}

/// Writes a plain-text error response: `message` followed by a newline.
pub fn write_error(writer: &mut dyn ResponseWriter, status: StatusCode, message: &str) {
    let headers = writer.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    writer.write_header(status);
    writer.write(format!("{message}\n").as_bytes());
}
