//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Validate names used as HTTP headers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Middleware names are checked later against the registry, which knows
//!   about application-registered middleware

use axum::http::HeaderName;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RouterConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than 0"));
    }
    if config.listener.body_limit_bytes == 0 {
        errors.push(ValidationError::new("listener.body_limit_bytes", "must be greater than 0"));
    }

    if config.routing.definitions.as_os_str().is_empty() {
        errors.push(ValidationError::new("routing.definitions", "must not be empty"));
    }
    let base = &config.routing.base_path;
    if !base.is_empty() && !base.starts_with('/') {
        errors.push(ValidationError::new("routing.base_path", "must be empty or start with '/'"));
    }
    if config.routing.cache.enabled && config.routing.cache.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("routing.cache.path", "must not be empty when the cache is enabled"));
    }

    for (i, name) in config.middleware.global.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(&format!("middleware.global[{i}]"), "must not be empty"));
        }
    }
    let auth = &config.middleware.auth;
    if !auth.login_path.is_empty() && !auth.login_path.starts_with('/') {
        errors.push(ValidationError::new("middleware.auth.login_path", "must be empty or start with '/'"));
    }
    if !auth.home_path.starts_with('/') {
        errors.push(ValidationError::new("middleware.auth.home_path", "must start with '/'"));
    }
    if config.middleware.rate_limit.burst_size == 0 {
        errors.push(ValidationError::new("middleware.rate_limit.burst_size", "must be greater than 0"));
    }
    for (i, header) in config.middleware.cors.allowed_headers.iter().enumerate() {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                &format!("middleware.cors.allowed_headers[{i}]"),
                format!("'{header}' is not a header name"),
            ));
        }
    }

    if HeaderName::from_bytes(config.identity.header.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "identity.header",
            format!("'{}' is not a header name", config.identity.header),
        ));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("'{}' is not one of {}", observability.log_level, LOG_LEVELS.join(", ")),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
