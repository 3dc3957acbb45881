//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, route engine, cache and watcher emit:
//!     → logging.rs (tracing subscriber: env filter, pretty or JSON)
//!     → metrics.rs (dispatch outcomes, cache events, halts, reloads)
//!     → tracing.rs (one span per dispatch, tagged with the request id)
//!
//! Prometheus scrapes the exporter when metrics are enabled; otherwise
//! the facade calls are no-ops.
//! ```

pub mod logging;
pub mod metrics;
pub mod tracing;
