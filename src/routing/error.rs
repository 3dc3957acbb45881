//! Routing error definitions.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, building or compiling a route table.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The route definitions file could not be read.
    #[error("failed to read route definitions {path:?}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The route definitions file is not valid TOML/JSON for the source schema.
    #[error("failed to parse route definitions {path:?}: {message}")]
    SourceParse { path: PathBuf, message: String },

    /// A leaf route declared an empty method set.
    #[error("route {0} declares no HTTP methods")]
    NoMethods(String),

    /// A free-form constraint is not a valid regular expression.
    #[error("route {pattern}: invalid constraint for '{param}': {message}")]
    InvalidConstraint {
        pattern: String,
        param: String,
        message: String,
    },

    /// The compiled matcher for a dynamic pattern failed to build.
    #[error("route {pattern}: cannot compile matcher: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A fallback key is not an HTTP status code.
    #[error("fallback key '{0}' is not an HTTP status code")]
    InvalidFallback(String),

    /// A middleware name does not resolve through the registry.
    #[error("unknown middleware '{name}' referenced by {referenced_by}")]
    UnknownMiddleware { name: String, referenced_by: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors raised by the route cache compiler.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The table carries inline middleware, which has no serialized form.
    #[error("route {0} uses inline middleware and cannot be cached")]
    Uncacheable(String),
}

/// Errors raised by reverse URL generation.
///
/// These indicate programming mistakes at the call site and are surfaced
/// to the caller instead of being downgraded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("named route not found: {0}")]
    NamedRouteNotFound(String),

    #[error("missing parameters for route {name}: {}", missing.join(", "))]
    MissingParameters { name: String, missing: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UrlError::MissingParameters {
            name: "predictions.edit".into(),
            missing: vec!["id".into(), "slug".into()],
        };
        assert_eq!(
            err.to_string(),
            "missing parameters for route predictions.edit: id, slug"
        );

        let err = RouterError::UnknownMiddleware {
            name: "admin".into(),
            referenced_by: "route /admin".into(),
        };
        assert!(err.to_string().contains("'admin'"));
    }
}
