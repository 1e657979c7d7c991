use std::convert::Infallible;

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, Request},
};
use tracing::Span;

/// The request's `x-request-id`, assigned by `SetRequestIdLayer` when the
/// caller did not send one.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .extensions
            .get::<tower_http::request_id::RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .unwrap_or("-");
        Ok(Self(id.to_string()))
    }
}

/// Span for one inbound request. Dispatch tasks spawned by a handler are
/// children of it, so their events carry the request id.
pub fn request_span(req: &Request<Body>) -> Span {
    let request_id = req
        .extensions()
        .get::<tower_http::request_id::RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        request_id = %request_id,
    )
}

/// Best-effort description of who sent a request, for log lines.
pub fn caller(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };
    format!(
        "forwarded_for={} user_agent={}",
        header("x-forwarded-for"),
        header("user-agent")
    )
}
