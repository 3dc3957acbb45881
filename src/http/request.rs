//! Request context passed through middleware and into handler actions.
//!
//! # Responsibilities
//! - Carry request ID, method, path, query, headers and body
//! - Carry the caller identity supplied by the session layer
//! - Carry raw and cast route parameters for the matched route
//!
//! # Design Decisions
//! - One context per dispatch; nothing in it is shared across requests
//! - Identity is an oracle consulted once, before dispatch

use axum::body::Bytes;
use axum::http::header::{HeaderMap, HeaderName, InvalidHeaderName};
use axum::http::Method;
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::dispatch::ParamValue;

/// Header carrying the correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The authenticated caller, as reported by the identity oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
}

/// Per-request state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub peer: Option<SocketAddr>,
    pub caller: Option<Caller>,
    /// Captured route parameters before casting.
    pub raw_params: HashMap<String, String>,
    /// Route parameters cast per the route's constraints.
    pub params: HashMap<String, ParamValue>,
}

impl RequestContext {
    /// Build a context from a method and a request target (`/path?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            peer: None,
            caller: None,
            raw_params: HashMap::new(),
            params: HashMap::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn with_caller(mut self, id: impl Into<String>) -> Self {
        self.caller = Some(Caller { id: id.into() });
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_authenticated(&self) -> bool {
        self.caller.is_some()
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn param_i64(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(ParamValue::as_i64)
    }

    pub fn raw_param(&self, name: &str) -> Option<&str> {
        self.raw_params.get(name).map(String::as_str)
    }

    /// Key used for per-client accounting: caller ID, then peer IP.
    pub fn client_key(&self) -> String {
        match (&self.caller, self.peer) {
            (Some(caller), _) => format!("caller:{}", caller.id),
            (None, Some(peer)) => format!("ip:{}", peer.ip()),
            (None, None) => "anonymous".to_string(),
        }
    }
}

/// Answers "who is the caller" from request headers.
pub trait IdentityOracle: Send + Sync {
    fn identify(&self, headers: &HeaderMap) -> Option<Caller>;
}

/// Trusts a header set by the upstream session layer.
#[derive(Debug, Clone)]
pub struct HeaderIdentity {
    header: HeaderName,
}

impl HeaderIdentity {
    pub fn new(header: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            header: HeaderName::from_bytes(header.as_bytes())?,
        })
    }
}

impl IdentityOracle for HeaderIdentity {
    fn identify(&self, headers: &HeaderMap) -> Option<Caller> {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Caller { id: id.to_string() })
    }
}
