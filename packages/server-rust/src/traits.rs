use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use breakfast_core::RequestState;

use crate::service::request::ApiRequest;

/// Sink for an HTTP response produced by an [`ApiHandler`].
///
/// Mirrors the usual header/status/body writer contract: the first status
/// set wins, and writing a body without setting a status implies `200 OK`.
pub trait ResponseWriter: Send {
    /// Response headers, mutable until the body is written.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sets the response status.
    fn write_header(&mut self, status: StatusCode);

    /// Appends body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> usize;
}

/// The HTTP extension point: handles one request against the shared
/// request state, writing the outcome into `writer`.
///
/// Implemented by the route dispatcher and by every HTTP decorator, so
/// decorators can be stacked in any order.
#[async_trait]
pub trait ApiHandler: Send + Sync {
    async fn serve(
        &self,
        state: &mut RequestState,
        request: &ApiRequest,
        writer: &mut dyn ResponseWriter,
    );
}

#[async_trait]
impl<T: ApiHandler + ?Sized> ApiHandler for Arc<T> {
    async fn serve(
        &self,
        state: &mut RequestState,
        request: &ApiRequest,
        writer: &mut dyn ResponseWriter,
    ) {
        (**self).serve(state, request, writer).await;
    }
}
