//! Configuration-change notifications
//!
//! Watches the directory holding the configuration file (editors often replace
//! the file rather than write it in place) and triggers a provisioning run when
//! the file is created or modified. Bursts of events are coalesced, and the
//! scheduler's replace-on-trigger policy absorbs whatever gets through.

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::scheduler::RunScheduler;

const SETTLE_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Failed to initialize file watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Configuration path has no parent directory: {0}")]
    NoParent(PathBuf),
}

pub struct ConfigWatcher {
    watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    config_path: PathBuf,
    scheduler: Arc<RunScheduler>,
}

impl ConfigWatcher {
    pub fn new(config_path: impl Into<PathBuf>, scheduler: Arc<RunScheduler>) -> Result<Self, WatcherError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                if let Err(e) = tx.send(res) {
                    error!("Failed to forward filesystem event: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(WatcherError::Init)?;

        Ok(Self {
            watcher,
            rx,
            config_path: config_path.into(),
            scheduler,
        })
    }

    /// Register the configuration directory with the OS watcher
    pub fn start(&mut self) -> Result<(), WatcherError> {
        let directory = watch_directory(&self.config_path)?;
        self.watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::Watch {
                path: directory.clone(),
                source,
            })?;

        info!(path = %self.config_path.display(), "Watching configuration file");
        Ok(())
    }

    /// Process events until the watcher is dropped
    pub async fn run(mut self) {
        while let Some(result) = self.rx.recv().await {
            match result {
                Ok(event) if is_config_event(&event, &self.config_path) => {
                    // Let the writer finish, then swallow the rest of the burst
                    tokio::time::sleep(SETTLE_DELAY).await;
                    while self.rx.try_recv().is_ok() {}

                    debug!(kind = ?event.kind, "Configuration changed");
                    self.scheduler.trigger().await;
                }
                Ok(_) => {}
                Err(e) => error!("Filesystem watcher error: {}", e),
            }
        }

        info!("Configuration watcher stopped");
    }
}

fn is_config_event(event: &Event, config_path: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|path| same_file_name(path, config_path))
}

fn watch_directory(config_path: &Path) -> Result<PathBuf, WatcherError> {
    match config_path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(PathBuf::from(".")),
        Some(parent) => Ok(parent.to_path_buf()),
        None => Err(WatcherError::NoParent(config_path.to_path_buf())),
    }
}

fn same_file_name(candidate: &Path, config_path: &Path) -> bool {
    candidate.file_name().is_some() && candidate.file_name() == config_path.file_name()
}
