//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing and timeout layers)
//!     → request.rs (assign request ID, mirror into response headers)
//!     → health path: HealthEngine evaluates and renders
//!     → any other path: wrapped application
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdState, X_OPENSTACK_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
