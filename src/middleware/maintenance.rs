//! Maintenance mode gate.

use axum::http::header::{self, HeaderValue};
use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use std::collections::HashSet;

use super::pipeline::{Flow, Middleware, Next};
use crate::config::schema::MaintenanceConfig;
use crate::http::request::RequestContext;
use crate::http::response::Response;

/// While enabled, only allow-listed callers continue; everyone else gets 503.
#[derive(Debug, Clone)]
pub struct Maintenance {
    enabled: bool,
    allowed: HashSet<String>,
    retry_after: HeaderValue,
}

impl Maintenance {
    pub fn new(config: &MaintenanceConfig) -> Self {
        Self {
            enabled: config.enabled,
            allowed: config.allowed_callers.iter().cloned().collect(),
            retry_after: HeaderValue::from(config.retry_after_secs),
        }
    }

    fn admits(&self, req: &RequestContext) -> bool {
        !self.enabled
            || req
                .caller
                .as_ref()
                .is_some_and(|caller| self.allowed.contains(&caller.id))
    }
}

impl Middleware for Maintenance {
    fn handle<'a>(&'a self, req: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Flow> {
        if self.admits(req) {
            return next.run(req);
        }
        let response = Response::from_status(StatusCode::SERVICE_UNAVAILABLE)
            .with_header(header::RETRY_AFTER, self.retry_after.clone());
        Box::pin(async move { Flow::Halt(response) })
    }
}
