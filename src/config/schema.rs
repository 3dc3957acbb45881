//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::routing::{CacheOptions, EngineOptions};

/// Root configuration for the router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Route definitions source, cache and base path.
    pub routing: RoutingConfig,

    /// Legacy script fallback.
    pub legacy: LegacyConfig,

    /// Global middleware and built-in middleware settings.
    pub middleware: MiddlewareConfig,

    /// Caller identity resolution.
    pub identity: IdentityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RouterConfig {
    /// Engine options derived from the routing section.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            definitions: self.routing.definitions.clone(),
            base_path: self.routing.base_path.clone(),
            cache: self.routing.cache.enabled.then(|| CacheOptions {
                path: self.routing.cache.path.clone(),
                auto_compile: self.routing.cache.auto_compile,
            }),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Route definitions file (TOML, or JSON by extension).
    pub definitions: PathBuf,

    /// Mount point stripped from inbound paths and prepended to generated URLs.
    pub base_path: String,

    /// Rebuild the table when the definitions file changes.
    pub watch: bool,

    pub cache: CacheConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            definitions: PathBuf::from("config/routes.toml"),
            base_path: String::new(),
            watch: false,
            cache: CacheConfig::default(),
        }
    }
}

/// Route cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Artifact path. The directory is created on first write.
    pub path: PathBuf,

    /// Write the artifact after building from source when it was absent or stale.
    pub auto_compile: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("storage/cache/routes.json"),
            auto_compile: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LegacyConfig {
    /// Dispatch to registered legacy shims when a route's handler is missing.
    pub enabled: bool,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Names run before every route's own middleware, in order.
    pub global: Vec<String>,

    pub auth: AuthConfig,
    pub maintenance: MaintenanceConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Where anonymous callers are sent. Empty means answer 401 instead.
    pub login_path: String,

    /// Where authenticated callers hitting guest-only routes are sent.
    pub home_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,

    /// Caller IDs still admitted during maintenance.
    pub allowed_callers: Vec<String>,

    /// Value of the `Retry-After` header in seconds.
    pub retry_after_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_callers: Vec::new(),
            retry_after_secs: 300,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per second per client.
    pub requests_per_second: u32,

    /// Burst size (max tokens).
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: vec!["content-type".to_string(), "authorization".to_string()],
            max_age_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Header set by the session layer with the authenticated caller ID.
    pub header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            header: "x-user-id".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
