// ABOUTME: Request tracing middleware for correlation and structured logging
// ABOUTME: Assigns request IDs and opens one span per HTTP request

use axum::body::Body;
use http::{HeaderName, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{field, Span};
use uuid::Uuid;

/// Header carrying the request correlation ID
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Generates `req_<uuid>` request IDs
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = format!("req_{}", Uuid::new_v4().simple());
        id.parse().ok().map(RequestId::new)
    }
}

/// Create a tracing span for an HTTP request
///
/// `user_id` is empty until the handler records it.
pub fn create_request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
        user_id = field::Empty,
    )
}
