//! Backend capability interface.
//!
//! # Contract
//! - `healthcheck` turns every expected failure of the checked target
//!   (missing file, refused connection, rejected credentials) into a
//!   `CheckResult` with `available == false`
//! - `Err(BackendError)` is reserved for the backend itself being broken;
//!   the aggregator converts it into an internal-error result
//! - Implementations bound their own I/O with timeouts

use async_trait::async_trait;
use thiserror::Error;

use crate::health::result::CheckResult;

/// Failure of the check implementation itself, as opposed to the target.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Options present but unusable at check time.
    #[error("Misconfigured backend: {0}")]
    Misconfigured(String),

    /// Unexpected I/O failure inside the backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else the backend could not recover from.
    #[error("{0}")]
    Internal(String),
}

/// A single health-check strategy.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Evaluate the check for the service listening on `listening_port`.
    async fn healthcheck(&self, listening_port: u16) -> Result<CheckResult, BackendError>;
}
