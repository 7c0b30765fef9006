//! Configuration file watcher for hot reload.
//!
//! Every accepted change is delivered as a complete, validated
//! `AppConfig`. Invalid edits are logged and dropped; the running
//! configuration stays in place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;

/// Watches one configuration file.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its update channel.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. Keep the returned handle alive for as long as
    /// reloads should be delivered.
    pub fn start(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, updates } = self;
        let reload_path = path.clone();

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) if is_content_change(&event.kind) => reload(&reload_path, &updates),
            Ok(_) => {}
            Err(e) => tracing::error!(error = ?e, "Config watch error"),
        };

        let mut watcher = RecommendedWatcher::new(
            handler,
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}

fn reload(path: &Path, updates: &mpsc::UnboundedSender<AppConfig>) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(
                path = %path.display(),
                backends = ?config.healthcheck.backends,
                "Configuration change accepted"
            );
            if updates.send(config).is_err() {
                tracing::debug!("Config update receiver dropped");
            }
        }
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Rejected configuration change, keeping current configuration"
            );
        }
    }
}
