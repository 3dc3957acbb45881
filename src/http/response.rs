//! Response produced by middleware, handler actions and fallbacks.
//!
//! # Responsibilities
//! - Provide small constructors for the common response shapes
//! - Convert into an axum response at the server edge
//!
//! # Design Decisions
//! - Bodies are buffered bytes; dispatch results are small pages or JSON
//! - Construction never fails: a header that cannot be encoded turns the
//!   response into a 500 instead of panicking

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Bare status page: the canonical reason phrase as plain text.
    pub fn from_status(status: StatusCode) -> Self {
        Self::text(status.canonical_reason().unwrap_or("")).with_status(status)
    }

    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, Bytes::new())
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body.into())
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body.into())
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))
    }

    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(StatusCode::OK, body)
                .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON response");
                Self::from_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// 302 to `location`.
    pub fn redirect(location: &str) -> Self {
        match HeaderValue::from_str(location) {
            Ok(value) => Self::empty(StatusCode::FOUND).with_header(header::LOCATION, value),
            Err(_) => {
                tracing::error!(location = %location, "Redirect target is not a valid header value");
                Self::from_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl axum::response::IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
