//! Check result value type.

use serde::Serialize;

/// Reason reported by a backend that found nothing wrong.
pub const REASON_OK: &str = "OK";

/// Reason used when a backend reports unavailability without saying why.
const REASON_UNSPECIFIED: &str = "Backend unavailable";

/// Outcome of a single backend check.
///
/// `reason` is a stable, operator-facing classification. Raw error text
/// belongs in `details`, which is only rendered in detailed mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    available: bool,
    reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl CheckResult {
    /// A passing result.
    pub fn available(reason: impl Into<String>) -> Self {
        Self {
            available: true,
            reason: reason.into(),
            details: None,
        }
    }

    /// A passing result with the default reason.
    pub fn ok() -> Self {
        Self::available(REASON_OK)
    }

    /// A failing result. An empty reason is replaced so that a failure
    /// always explains itself.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.trim().is_empty() {
            reason = REASON_UNSPECIFIED.to_string();
        }
        Self {
            available: false,
            reason,
            details: None,
        }
    }

    /// Attach diagnostic text.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}
