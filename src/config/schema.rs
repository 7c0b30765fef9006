//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! health endpoint. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Health endpoint and backend settings.
    pub healthcheck: HealthcheckConfig,

    /// Request identifier middleware settings.
    pub request_id: RequestIdConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Total time allowed for one request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthcheckConfig {
    /// Path the endpoint answers on.
    pub path: String,

    /// Backends to evaluate, in order.
    pub backends: Vec<String>,

    /// Expose raw diagnostic details in responses.
    pub detailed: bool,

    /// Per-backend timeout in milliseconds.
    pub timeout_ms: u64,

    /// Options for the `disable_by_file` backend.
    pub disable_by_file: DisableByFileConfig,

    /// Options for the `disable_by_files_ports` backend.
    pub disable_by_files_ports: DisableByFilesPortsConfig,

    /// Options for the `ldap_bind` backend.
    pub ldap_bind: LdapBindConfig,
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        Self {
            path: "/healthcheck".to_string(),
            backends: Vec::new(),
            detailed: false,
            timeout_ms: 5_000,
            disable_by_file: DisableByFileConfig::default(),
            disable_by_files_ports: DisableByFilesPortsConfig::default(),
            ldap_bind: LdapBindConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DisableByFileConfig {
    /// Marker path; `{port}` expands to the listening port.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DisableByFilesPortsConfig {
    /// Entries of the form `"port:path"`.
    pub paths: Vec<String>,
}

#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LdapBindConfig {
    /// Directory server URI (ldap:// or ldaps://).
    pub uri: Option<String>,

    /// Bind DN. Anonymous bind when unset.
    pub bind_dn: Option<String>,

    pub bind_password: Option<String>,
}

impl std::fmt::Debug for LdapBindConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapBindConfig")
            .field("uri", &self.uri)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Request identifier middleware configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RequestIdConfig {
    /// Extra response headers that mirror `x-openstack-request-id`.
    pub compat_headers: Vec<String>,

    /// Reuse a well-formed inbound `x-openstack-request-id` instead of
    /// generating a fresh one.
    pub propagate_inbound: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.healthcheck.path, "/healthcheck");
        assert!(!config.healthcheck.detailed);
        assert!(config.healthcheck.backends.is_empty());
        assert!(!config.request_id.propagate_inbound);
    }

    #[test]
    fn test_full_config_parses() {
        let config: AppConfig = toml::from_str(
            r#"
            [healthcheck]
            backends = ["ldap_bind", "disable_by_file"]
            detailed = true

            [healthcheck.disable_by_file]
            path = "/etc/healthgate/disable-{port}"

            [healthcheck.ldap_bind]
            uri = "ldap://directory.internal"
            bind_dn = "cn=monitor,dc=example,dc=org"
            bind_password = "hunter2"

            [request_id]
            compat_headers = ["x-compute-request-id"]

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.healthcheck.backends, vec!["ldap_bind", "disable_by_file"]);
        assert_eq!(
            config.healthcheck.disable_by_file.path.as_deref(),
            Some("/etc/healthgate/disable-{port}")
        );
        assert_eq!(config.request_id.compat_headers, vec!["x-compute-request-id"]);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(!format!("{:?}", config.healthcheck.ldap_bind).contains("hunter2"));
    }
}
