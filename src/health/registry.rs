//! Backend registry.
//!
//! Maps configuration names to factories. The set is fixed when the
//! registry is built; embedders add their own checks with `register`
//! before handing the registry to the server.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::HealthcheckConfig;
use crate::health::aggregator::CheckEntry;
use crate::health::backend::Backend;
use crate::health::file::{parse_port_paths, FilePresenceBackend};
use crate::health::ldap::{DirectoryBindBackend, DirectorySettings};

pub const DISABLE_BY_FILE: &str = "disable_by_file";
pub const DISABLE_BY_FILES_PORTS: &str = "disable_by_files_ports";
pub const LDAP_BIND: &str = "ldap_bind";

/// Names understood by [`Registry::builtin`].
pub const BUILTIN_BACKENDS: &[&str] = &[DISABLE_BY_FILE, DISABLE_BY_FILES_PORTS, LDAP_BIND];

/// Builds a backend from the health check configuration section.
pub type BackendFactory = fn(&HealthcheckConfig) -> Result<Arc<dyn Backend>, BuildError>;

/// Errors raised while turning configuration into backends.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("Backend '{0}' is enabled more than once")]
    DuplicateBackend(String),

    #[error("Invalid options for backend '{backend}': {reason}")]
    InvalidOptions { backend: String, reason: String },
}

#[derive(Clone)]
pub struct Registry {
    factories: Vec<(String, BackendFactory)>,
}

impl Registry {
    /// Registry with no backends.
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Registry holding the built-in backends.
    pub fn builtin() -> Self {
        Self::empty()
            .register(DISABLE_BY_FILE, build_disable_by_file)
            .register(DISABLE_BY_FILES_PORTS, build_disable_by_files_ports)
            .register(LDAP_BIND, build_ldap_bind)
    }

    /// Add or replace a factory.
    pub fn register(mut self, name: impl Into<String>, factory: BackendFactory) -> Self {
        let name = name.into();
        self.factories.retain(|(existing, _)| *existing != name);
        self.factories.push((name, factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn lookup(&self, name: &str) -> Option<BackendFactory> {
        self.factories
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, factory)| *factory)
    }

    /// Instantiate the enabled backends in configured order.
    pub fn build(&self, config: &HealthcheckConfig) -> Result<Vec<CheckEntry>, BuildError> {
        let mut entries: Vec<CheckEntry> = Vec::with_capacity(config.backends.len());
        for name in &config.backends {
            if entries.iter().any(|e| e.name() == name) {
                return Err(BuildError::DuplicateBackend(name.clone()));
            }
            let factory = self
                .lookup(name)
                .ok_or_else(|| BuildError::UnknownBackend(name.clone()))?;
            entries.push(CheckEntry::new(name.clone(), factory(config)?));
        }
        Ok(entries)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn build_disable_by_file(config: &HealthcheckConfig) -> Result<Arc<dyn Backend>, BuildError> {
    let backend = match &config.disable_by_file.path {
        Some(template) => FilePresenceBackend::from_template(template.clone()),
        None => FilePresenceBackend::unconfigured(),
    };
    Ok(Arc::new(backend))
}

fn build_disable_by_files_ports(config: &HealthcheckConfig) -> Result<Arc<dyn Backend>, BuildError> {
    let paths = parse_port_paths(&config.disable_by_files_ports.paths).map_err(|reason| {
        BuildError::InvalidOptions {
            backend: DISABLE_BY_FILES_PORTS.to_string(),
            reason,
        }
    })?;
    Ok(Arc::new(FilePresenceBackend::from_port_map(paths)))
}

fn build_ldap_bind(config: &HealthcheckConfig) -> Result<Arc<dyn Backend>, BuildError> {
    let options = &config.ldap_bind;
    let backend = match options.uri.as_deref().map(str::trim) {
        Some(uri) if !uri.is_empty() => DirectoryBindBackend::new(DirectorySettings {
            uri: uri.to_string(),
            bind_dn: options.bind_dn.clone().unwrap_or_default(),
            bind_password: options.bind_password.clone().unwrap_or_default(),
            timeout: directory_budget(Duration::from_millis(config.timeout_ms)),
        }),
        _ => DirectoryBindBackend::unconfigured(),
    };
    Ok(Arc::new(backend))
}

/// Time the directory check may spend before the aggregator's own timeout
/// for the same backend fires. Keeps "Bind failed" the reported reason for
/// an unresponsive directory.
fn directory_budget(backend_timeout: Duration) -> Duration {
    backend_timeout * 3 / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(backends: &[&str]) -> HealthcheckConfig {
        HealthcheckConfig {
            backends: backends.iter().map(|b| b.to_string()).collect(),
            ..HealthcheckConfig::default()
        }
    }

    #[test]
    fn test_build_preserves_configured_order() {
        let entries = Registry::builtin()
            .build(&config_with(&[LDAP_BIND, DISABLE_BY_FILE, DISABLE_BY_FILES_PORTS]))
            .unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec![LDAP_BIND, DISABLE_BY_FILE, DISABLE_BY_FILES_PORTS]);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = Registry::builtin().build(&config_with(&["carrier_pigeon"])).err().unwrap();
        assert!(matches!(err, BuildError::UnknownBackend(name) if name == "carrier_pigeon"));
    }

    #[test]
    fn test_duplicate_backend_rejected() {
        let err = Registry::builtin()
            .build(&config_with(&[DISABLE_BY_FILE, DISABLE_BY_FILE]))
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::DuplicateBackend(_)));
    }

    #[test]
    fn test_invalid_port_paths_rejected() {
        let mut config = config_with(&[DISABLE_BY_FILES_PORTS]);
        config.disable_by_files_ports.paths = vec!["eighty:/tmp/x".into()];
        let err = Registry::builtin().build(&config).err().unwrap();
        assert!(matches!(err, BuildError::InvalidOptions { .. }));
    }

    #[test]
    fn test_register_custom_backend() {
        fn build_noop(_: &HealthcheckConfig) -> Result<Arc<dyn Backend>, BuildError> {
            Ok(Arc::new(FilePresenceBackend::unconfigured()))
        }

        let registry = Registry::empty().register("noop", build_noop);
        assert!(registry.contains("noop"));
        assert!(!registry.contains(DISABLE_BY_FILE));
        assert_eq!(registry.build(&config_with(&["noop"])).unwrap().len(), 1);
    }

    #[test]
    fn test_directory_budget_ends_before_backend_timeout() {
        for ms in [1, 300, 5000] {
            let timeout = Duration::from_millis(ms);
            assert!(directory_budget(timeout) < timeout);
        }
        assert_eq!(directory_budget(Duration::from_millis(400)), Duration::from_millis(300));
    }
}
