use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query};
use axum::http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};

/// Username used when the request carries none.
pub const ANONYMOUS: &str = "<anonymous>";

/// Region used when the request carries none.
pub const UNKNOWN_REGION: &str = "??";

const REQUEST_ID: &str = "x-request-id";

/// The request-side view shared by the handler stack: method, URI, headers,
/// peer address, and the decoded query string.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    query: HashMap<String, String>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let query = Query::<HashMap<String, String>>::try_from_uri(&uri)
            .map(|Query(query)| query)
            .unwrap_or_default();
        Self {
            method,
            uri,
            headers,
            remote_addr,
            query,
        }
    }

    /// Builds the view from axum request parts, picking up the peer address
    /// when the server was started with connect info.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Self::new(
            parts.method.clone(),
            parts.uri.clone(),
            parts.headers.clone(),
            remote_addr,
        )
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus query, as received.
    #[must_use]
    pub fn url(&self) -> String {
        self.uri.to_string()
    }

    /// Peer address as `ip:port`, empty when unknown.
    #[must_use]
    pub fn remote_addr(&self) -> String {
        self.remote_addr
            .map(|addr| addr.to_string())
            .unwrap_or_default()
    }

    /// Declared body length: the `Content-Length` value, `-1` for a chunked
    /// body of unknown length, `0` otherwise.
    #[must_use]
    pub fn content_length(&self) -> i64 {
        if let Some(length) = self
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
        {
            return length;
        }
        if self.headers.contains_key(TRANSFER_ENCODING) {
            -1
        } else {
            0
        }
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(REQUEST_ID).and_then(|v| v.to_str().ok())
    }

    /// Non-empty query parameter value.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.query("username").unwrap_or(ANONYMOUS)
    }

    #[must_use]
    pub fn region(&self) -> &str {
        self.query("region").unwrap_or(UNKNOWN_REGION)
    }
}
