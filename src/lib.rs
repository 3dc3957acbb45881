//! Prediction Router Library
//!
//! Route resolution, route caching and middleware dispatch for the
//! prediction site.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod routing;

pub use config::schema::RouterConfig;
pub use dispatch::Dispatcher;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::RouteEngine;
