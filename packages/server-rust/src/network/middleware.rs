//! HTTP middleware stack for the breakfast API listener.
//!
//! Builds the Tower middleware pipeline applied to all API requests.
//! Middleware ordering follows the outer-to-inner convention: the first
//! layer listed is the outermost (processes the request first on the way
//! in, and the response last on the way out).

use axum::http::header::{HeaderName, STRICT_TRANSPORT_SECURITY};
use axum::http::HeaderValue;
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Value of the `Strict-Transport-Security` header on every API response.
pub const HSTS: &str = "max-age=63072000; includeSubDomains";

/// The composed Tower layer type produced by [`build_http_layers`].
type HttpLayers = Stack<
    SetResponseHeaderLayer<HeaderValue>,
    Stack<PropagateRequestIdLayer, Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>>,
>;

/// Builds the transport-level middleware stack for the API listener.
///
/// **Middleware ordering (outermost to innermost):**
/// 1. `SetRequestId` -- assigns a UUID v4 `X-Request-Id` when the client sent none
/// 2. `PropagateRequestId` -- copies `X-Request-Id` from the request to the response
/// 3. `SetResponseHeader` -- adds the HSTS header
///
/// Logging, metrics, and tracing happen inside the handler stack, where
/// they see the request id set here.
#[must_use]
pub fn build_http_layers() -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .layer(SetResponseHeaderLayer::overriding(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        ))
        .into_inner()
}
