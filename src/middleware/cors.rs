//! CORS preflight handling.
//!
//! Preflights (`OPTIONS` with `Access-Control-Request-Method`) are answered
//! here with 204 and never reach a handler. Everything else continues.

use axum::http::header::{self, HeaderValue};
use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;

use super::pipeline::{Flow, Middleware, Next};
use crate::config::schema::CorsConfig;
use crate::http::request::RequestContext;
use crate::http::response::Response;

#[derive(Debug, Clone)]
pub struct Cors {
    any_origin: bool,
    origins: Vec<String>,
    methods: Option<HeaderValue>,
    headers: Option<HeaderValue>,
    max_age: HeaderValue,
}

impl Cors {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            any_origin: config.allowed_origins.iter().any(|o| o == "*"),
            origins: config.allowed_origins.clone(),
            methods: header_list(&config.allowed_methods),
            headers: header_list(&config.allowed_headers),
            max_age: HeaderValue::from(config.max_age_secs),
        }
    }

    fn allow_origin(&self, origin: Option<&str>) -> Option<HeaderValue> {
        if self.any_origin {
            return Some(HeaderValue::from_static("*"));
        }
        origin
            .filter(|o| self.origins.iter().any(|allowed| allowed == o))
            .and_then(|o| HeaderValue::from_str(o).ok())
    }

    fn preflight(&self, req: &RequestContext) -> Response {
        let Some(origin) = self.allow_origin(req.header("origin")) else {
            tracing::debug!(origin = ?req.header("origin"), "CORS preflight from disallowed origin");
            return Response::from_status(StatusCode::FORBIDDEN);
        };

        let mut response = Response::empty(StatusCode::NO_CONTENT)
            .with_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin)
            .with_header(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        if let Some(methods) = &self.methods {
            response = response.with_header(header::ACCESS_CONTROL_ALLOW_METHODS, methods.clone());
        }
        if let Some(headers) = &self.headers {
            response = response.with_header(header::ACCESS_CONTROL_ALLOW_HEADERS, headers.clone());
        }
        if !self.any_origin {
            response = response.with_header(header::VARY, HeaderValue::from_static("origin"));
        }
        response
    }
}

fn header_list(values: &[String]) -> Option<HeaderValue> {
    if values.is_empty() {
        return None;
    }
    HeaderValue::from_str(&values.join(", "))
        .map_err(|_| tracing::warn!(values = ?values, "CORS list is not a valid header value"))
        .ok()
}

impl Middleware for Cors {
    fn handle<'a>(&'a self, req: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Flow> {
        let is_preflight =
            req.method == Method::OPTIONS && req.headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
        if !is_preflight {
            return next.run(req);
        }
        let response = self.preflight(req);
        Box::pin(async move { Flow::Halt(response) })
    }
}
