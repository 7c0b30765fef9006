//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, per-backend spans)
//!     → metrics.rs (check outcomes, durations, response codes)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID is recorded on every request span
//! - Metrics are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
