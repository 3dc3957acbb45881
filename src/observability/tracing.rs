//! Request spans.
//!
//! Every dispatch runs inside a span carrying the request ID so log lines
//! from middleware, handlers and the legacy adapter correlate.

use tracing::Span;

use crate::http::request::RequestContext;

/// Span for one dispatch. Route fields are recorded once matched.
pub fn dispatch_span(req: &RequestContext) -> Span {
    tracing::info_span!(
        "dispatch",
        request_id = %req.request_id,
        method = %req.method,
        path = %req.path,
        route = tracing::field::Empty,
        handler = tracing::field::Empty,
    )
}

/// Record the matched route on the current dispatch span.
pub fn record_route(span: &Span, pattern: &str, handler: &str) {
    span.record("route", pattern);
    span.record("handler", handler);
}
