//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     MiddlewareConfig → registry.rs (built-ins by name)
//!     global names + table references → validated once
//!
//! Per request (after the route matched):
//!     global pipeline → route pipeline (declaration order)
//!     → any stage may Halt with its own response
//!     → Continue reaches the handler
//! ```
//!
//! # Design Decisions
//! - Stages run before the handler only; they never see its response
//! - Halting is the only way to write a response from middleware
//! - Unknown names are configuration errors, never per-request failures

pub mod auth;
pub mod cors;
pub mod maintenance;
pub mod pipeline;
pub mod rate_limit;
pub mod registry;

pub use auth::{GuestOnly, RequireAuth};
pub use cors::Cors;
pub use maintenance::Maintenance;
pub use pipeline::{Flow, FnMiddleware, Middleware, Next, Pipeline};
pub use rate_limit::RateLimiter;
pub use registry::MiddlewareRegistry;
