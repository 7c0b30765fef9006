//! Sequential evaluation of the configured backends.
//!
//! # Responsibilities
//! - Run each backend in configured order
//! - Bound every backend by the configured timeout
//! - Contain backend errors and panics as failing results
//! - Combine results into an [`AggregateResult`]

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use futures_util::FutureExt;
use tracing::Instrument;

use crate::health::backend::Backend;
use crate::health::result::CheckResult;
use crate::observability::metrics;

pub const REASON_INTERNAL_ERROR: &str = "Internal error evaluating backend";
pub const REASON_TIMED_OUT: &str = "Timed out evaluating backend";

/// A backend together with the name it was enabled under.
#[derive(Clone)]
pub struct CheckEntry {
    name: String,
    backend: Arc<dyn Backend>,
}

impl CheckEntry {
    pub fn new(name: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Results of one evaluation, in configured order.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    results: Vec<(String, CheckResult)>,
    evaluated_at: SystemTime,
}

impl AggregateResult {
    pub fn new(results: Vec<(String, CheckResult)>) -> Self {
        Self {
            results,
            evaluated_at: SystemTime::now(),
        }
    }

    /// True when every backend is available. Vacuously true with no backends.
    pub fn is_available(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_available())
    }

    pub fn results(&self) -> &[(String, CheckResult)] {
        &self.results
    }

    /// Failing backends, in configured order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &CheckResult)> {
        self.results
            .iter()
            .filter(|(_, r)| !r.is_available())
            .map(|(name, r)| (name.as_str(), r))
    }

    pub fn evaluated_at(&self) -> SystemTime {
        self.evaluated_at
    }
}

/// Runs a fixed list of backends.
#[derive(Clone)]
pub struct Aggregator {
    checks: Vec<CheckEntry>,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(checks: Vec<CheckEntry>, timeout: Duration) -> Self {
        Self { checks, timeout }
    }

    pub fn backend_names(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|c| c.name())
    }

    /// Evaluate every backend one after another.
    pub async fn evaluate(&self, listening_port: u16) -> AggregateResult {
        let mut results = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            let span = tracing::debug_span!("backend_check", backend = %check.name, port = listening_port);
            let started = Instant::now();
            let result = self
                .evaluate_one(check, listening_port)
                .instrument(span)
                .await;

            metrics::record_backend_check(&check.name, result.is_available(), started);
            results.push((check.name.clone(), result));
        }

        AggregateResult::new(results)
    }

    async fn evaluate_one(&self, check: &CheckEntry, listening_port: u16) -> CheckResult {
        let guarded = AssertUnwindSafe(check.backend.healthcheck(listening_port)).catch_unwind();

        match tokio::time::timeout(self.timeout, guarded).await {
            Ok(Ok(Ok(result))) => {
                if !result.is_available() {
                    tracing::warn!(reason = %result.reason(), "Backend reported unavailable");
                }
                result
            }
            Ok(Ok(Err(e))) => {
                tracing::error!(error = %e, "Backend failed internally");
                CheckResult::unavailable(REASON_INTERNAL_ERROR).with_details(e.to_string())
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "Backend panicked");
                CheckResult::unavailable(REASON_INTERNAL_ERROR).with_details(message)
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Backend timed out");
                CheckResult::unavailable(REASON_TIMED_OUT)
                    .with_details(format!("no result within {} ms", self.timeout.as_millis()))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "backend panicked".to_string()
    }
}
