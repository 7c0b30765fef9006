//! Health check aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! HealthcheckConfig
//!     → registry.rs (backend name → factory, configured order)
//!     → engine.rs (aggregator + detailed flag, swapped on reload)
//!
//! Per request:
//!     engine.rs
//!     → aggregator.rs (run each backend in order, contain failures)
//!     → file.rs / ldap.rs / custom backends (produce CheckResult)
//!     → render.rs (negotiate content type, status, body)
//! ```
//!
//! # Design Decisions
//! - Backends run sequentially; output order equals configured order
//! - No state survives between evaluations
//! - A misbehaving backend degrades the endpoint to 503, never to an error
//! - Enabled backends without options pass

pub mod aggregator;
pub mod backend;
pub mod engine;
pub mod file;
pub mod ldap;
pub mod registry;
pub mod render;
pub mod result;

pub use aggregator::{AggregateResult, Aggregator, CheckEntry};
pub use backend::{Backend, BackendError};
pub use engine::HealthEngine;
pub use file::FilePresenceBackend;
pub use ldap::{DirectoryBindBackend, DirectorySettings};
pub use registry::{BuildError, Registry};
pub use render::{negotiate, render, ContentType, RenderedResponse};
pub use result::CheckResult;
