//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that enabled backends exist in the registry
//! - Validate value ranges (timeouts > 0, header names, port entries)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::health::file::parse_port_paths;
use crate::health::registry::{Registry, DISABLE_BY_FILES_PORTS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("listener.request_timeout_secs must be greater than zero")]
    RequestTimeout,

    #[error("healthcheck.path '{0}' must start with '/'")]
    HealthPath(String),

    #[error("healthcheck.timeout_ms must be greater than zero")]
    BackendTimeout,

    #[error(
        "{backends} backends x healthcheck.timeout_ms {timeout_ms} must stay below \
         listener.request_timeout_secs {request_timeout_secs}"
    )]
    CheckBudget {
        backends: usize,
        timeout_ms: u64,
        request_timeout_secs: u64,
    },

    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("backend '{0}' is enabled more than once")]
    DuplicateBackend(String),

    #[error("healthcheck.disable_by_files_ports: {0}")]
    PortPaths(String),

    #[error("healthcheck.ldap_bind.uri '{0}' must use ldap://, ldaps:// or ldapi://")]
    LdapUri(String),

    #[error("request_id.compat_headers: '{0}' is not a valid header name")]
    CompatHeader(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate against the built-in backend registry.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    validate_with_registry(config, &Registry::builtin())
}

pub fn validate_with_registry(config: &AppConfig, registry: &Registry) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    let health = &config.healthcheck;
    if !health.path.starts_with('/') {
        errors.push(ValidationError::HealthPath(health.path.clone()));
    }
    if health.timeout_ms == 0 {
        errors.push(ValidationError::BackendTimeout);
    }

    // Backends run in sequence; their worst case must fit in one request.
    let worst_case_ms = (health.backends.len() as u64).saturating_mul(health.timeout_ms);
    let request_budget_ms = config.listener.request_timeout_secs.saturating_mul(1000);
    if request_budget_ms > 0 && worst_case_ms >= request_budget_ms {
        errors.push(ValidationError::CheckBudget {
            backends: health.backends.len(),
            timeout_ms: health.timeout_ms,
            request_timeout_secs: config.listener.request_timeout_secs,
        });
    }

    let mut seen = HashSet::new();
    for name in &health.backends {
        if !registry.contains(name) {
            errors.push(ValidationError::UnknownBackend(name.clone()));
        }
        if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(name.clone()));
        }
    }

    // Only validated when enabled; disabled sections may hold anything.
    if seen.contains(DISABLE_BY_FILES_PORTS) {
        if let Err(reason) = parse_port_paths(&health.disable_by_files_ports.paths) {
            errors.push(ValidationError::PortPaths(reason));
        }
    }

    if let Some(uri) = health.ldap_bind.uri.as_deref().map(str::trim) {
        let known_scheme = ["ldap://", "ldaps://", "ldapi://"]
            .iter()
            .any(|scheme| uri.to_ascii_lowercase().starts_with(scheme));
        if !uri.is_empty() && !known_scheme {
            errors.push(ValidationError::LdapUri(uri.to_string()));
        }
    }

    for header in &config.request_id.compat_headers {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::CompatHeader(header.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(config.observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
