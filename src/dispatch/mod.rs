//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → dispatcher.rs (match, cast, middleware, resolve)
//!     → params.rs (constraint-driven casting)
//!     → handler.rs (handler id → controller → action)
//!     → legacy.rs (registered shims for unported scripts)
//!     → Response
//! ```

pub mod dispatcher;
pub mod handler;
pub mod legacy;
pub mod params;

pub use dispatcher::{Dispatcher, Outcome};
pub use handler::{Action, ActionError, Controller, HandlerError, HandlerFactory, HandlerRegistry};
pub use legacy::{LegacyAdapter, LegacyError};
pub use params::{cast_params, ParamValue};
