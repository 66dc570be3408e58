//! Configuration file watcher for hot reload.
//!
//! Watches the directory holding the config file so editors that save by
//! rename are still seen, and only forwards reloads that actually differ
//! from the last accepted configuration.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AcquisitionConfig;

/// Monitors the acquisition config file and forwards validated changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: AcquisitionConfig,
    update_tx: mpsc::UnboundedSender<AcquisitionConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration the service started with.
    pub fn new(path: &Path, current: AcquisitionConfig) -> (Self, mpsc::UnboundedReceiver<AcquisitionConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            mut current,
            update_tx,
        } = self;
        let file_name = path.file_name().map(OsString::from);
        let dir = watch_dir(&path);
        let config_path = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches_file(&event, file_name.as_deref()) => match load_config(&config_path) {
                    Ok(next) if next == current => {
                        tracing::debug!(path = %config_path.display(), "Config file touched, content unchanged");
                    }
                    Ok(next) => {
                        let machines = changed_machines(&current, &next);
                        tracing::info!(
                            path = %config_path.display(),
                            machines = ?machines,
                            "Config change detected"
                        );
                        if update_tx.send(next.clone()).is_ok() {
                            current = next;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                    }
                },
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), dir = %dir.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Modify or create event on the config file itself.
fn touches_file(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    let Some(file_name) = file_name else {
        return false;
    };
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.file_name() == Some(file_name))
}

/// Ids of machines added, removed or edited between two configurations.
pub fn changed_machines(current: &AcquisitionConfig, next: &AcquisitionConfig) -> Vec<String> {
    let mut ids: Vec<String> = next
        .machines
        .iter()
        .filter(|m| current.machine(&m.id) != Some(*m))
        .map(|m| m.id.clone())
        .collect();
    ids.extend(
        current
            .machines
            .iter()
            .filter(|m| next.machine(&m.id).is_none())
            .map(|m| m.id.clone()),
    );
    ids
}
