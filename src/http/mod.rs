//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → request.rs (RequestContext: identity, peer, body)
//!     → [dispatcher: match, middleware, handler]
//!     → response.rs (Response → axum response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{Caller, HeaderIdentity, IdentityOracle, RequestContext, X_REQUEST_ID};
pub use response::Response;
pub use server::HttpServer;
