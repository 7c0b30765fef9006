//! Pluggable health check endpoint.
//!
//! Evaluates an ordered set of backend checks, renders the aggregate as
//! JSON, plain text or HTML, and tags every response with a request ID.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use health::{Backend, CheckResult, HealthEngine, Registry};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
