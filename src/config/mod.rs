//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → engine options, middleware settings, listener settings
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, CacheConfig, CorsConfig, IdentityConfig, LegacyConfig, ListenerConfig, MaintenanceConfig,
    MiddlewareConfig, ObservabilityConfig, RateLimitConfig, RouterConfig, RoutingConfig,
};
pub use validation::{validate_config, ValidationError};
