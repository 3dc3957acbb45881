//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     routes.toml / RouteDefinitions
//!     → loader.rs (parse nested source)
//!     → builder.rs (flatten groups: prefix, middleware, namespace)
//!     → cache.rs (snapshot + mtime tag; reused while source unchanged)
//!     → matcher.rs (static map + ordered dynamic regexes)
//!     → Freeze as immutable RouteEngine
//!
//! Incoming Request (path, method)
//!     → matcher.rs (static lookup, then dynamic scan)
//!     → Return: MatchResult or no match
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Static routes never compete with dynamic ones
//! - Deterministic: declaration order is the dynamic tie-break
//! - Last definition wins on duplicate patterns

pub mod builder;
pub mod cache;
pub mod definition;
pub mod engine;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod pattern;
pub mod table;
pub mod url;
pub mod watcher;

pub use builder::build;
pub use cache::{RouteCache, RouteCacheArtifact};
pub use definition::{
    Constraint, HandlerRef, HttpMethod, MiddlewareRef, Route, RouteDefinitions, RouteEntry, RouteSource,
};
pub use engine::{CacheOptions, EngineOptions, RouteEngine, TableOrigin};
pub use error::{CacheError, RouterError, UrlError};
pub use matcher::{MatchResult, RouteMatcher};
pub use table::{NamedRouteIndex, RouteTable};
pub use url::UrlGenerator;
pub use watcher::RouteWatcher;
