//! File presence checks.
//!
//! Operators take a service out of rotation by creating a marker file.
//! The check passes while the marker is absent.
//!
//! # Path sources
//! - Template: one path, `{port}` replaced by the listening port
//! - Per port: explicit `port -> path` table, ports without an entry pass
//! - Unconfigured: always passes

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::health::backend::{Backend, BackendError};
use crate::health::result::CheckResult;

/// Placeholder substituted with the listening port in path templates.
pub const PORT_PLACEHOLDER: &str = "{port}";

pub const REASON_PATH_EXISTS: &str = "Path exists";
pub const REASON_PATH_UNKNOWN: &str = "Unable to determine path state";

#[derive(Debug, Clone)]
enum PathSource {
    Unconfigured,
    Template(String),
    PerPort(HashMap<u16, PathBuf>),
}

/// Reports unavailable while a marker path exists.
#[derive(Debug, Clone)]
pub struct FilePresenceBackend {
    source: PathSource,
}

impl FilePresenceBackend {
    /// Backend with no path configured. Always available.
    pub fn unconfigured() -> Self {
        Self {
            source: PathSource::Unconfigured,
        }
    }

    /// Backend watching a single path template. An empty template is
    /// treated as unconfigured.
    pub fn from_template(template: impl Into<String>) -> Self {
        let template = template.into();
        if template.trim().is_empty() {
            return Self::unconfigured();
        }
        Self {
            source: PathSource::Template(template),
        }
    }

    /// Backend watching one path per listening port.
    pub fn from_port_map(paths: HashMap<u16, PathBuf>) -> Self {
        if paths.is_empty() {
            return Self::unconfigured();
        }
        Self {
            source: PathSource::PerPort(paths),
        }
    }

    /// The path checked for `listening_port`, if any.
    pub fn resolve(&self, listening_port: u16) -> Option<PathBuf> {
        match &self.source {
            PathSource::Unconfigured => None,
            PathSource::Template(template) => Some(PathBuf::from(
                template.replace(PORT_PLACEHOLDER, &listening_port.to_string()),
            )),
            PathSource::PerPort(paths) => paths.get(&listening_port).cloned(),
        }
    }
}

#[async_trait]
impl Backend for FilePresenceBackend {
    async fn healthcheck(&self, listening_port: u16) -> Result<CheckResult, BackendError> {
        let Some(path) = self.resolve(listening_port) else {
            return Ok(CheckResult::ok());
        };

        let result = match tokio::fs::try_exists(&path).await {
            Ok(false) => CheckResult::ok(),
            Ok(true) => CheckResult::unavailable(REASON_PATH_EXISTS)
                .with_details(format!("{} is present", path.display())),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not stat marker path");
                CheckResult::unavailable(REASON_PATH_UNKNOWN)
                    .with_details(format!("{}: {}", path.display(), e))
            }
        };
        Ok(result)
    }
}

/// Parse `"port:path"` entries into a lookup table.
///
/// Returns the first offending entry on failure.
pub fn parse_port_paths(entries: &[String]) -> Result<HashMap<u16, PathBuf>, String> {
    let mut paths = HashMap::with_capacity(entries.len());
    for entry in entries {
        let (port, path) = entry
            .split_once(':')
            .ok_or_else(|| format!("'{}' is not of the form port:path", entry))?;
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| format!("'{}' has an invalid port", entry))?;
        let path = path.trim();
        if path.is_empty() {
            return Err(format!("'{}' has an empty path", entry));
        }
        if paths.insert(port, PathBuf::from(path)).is_some() {
            return Err(format!("port {} is listed more than once", port));
        }
    }
    Ok(paths)
}
