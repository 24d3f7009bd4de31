//! Hot reload of the site config.
//!
//! # Responsibilities
//! - Turn filesystem notifications for the config file into change signals
//! - Settle bursts of signals, then re-read the file once
//! - Compile the new contents into a [`Site`] and swap it in
//!
//! # Design Decisions
//! - The parent directory is watched, so editors that save by rename are seen
//! - The notify callback only signals; reading and compiling happen on a task
//! - Contents identical to the live config are not recompiled
//! - A config that fails to parse or compile leaves the live site in place

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::observability::metrics;
use crate::site::Site;

/// Quiet period after the last notification before the file is read.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Forwards change notifications for one config file.
pub struct ConfigWatcher {
    path: PathBuf,
    changed_tx: mpsc::UnboundedSender<()>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its change signals.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (changed_tx, changed_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                changed_tx,
            },
            changed_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self.path.file_name().map(OsString::from);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tx = self.changed_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(OsString::from) == file_name);
                    if touches_file && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::debug!(kind = ?event.kind, "Config file change detected");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// What one reload attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged,
    Applied,
    Rejected,
}

/// Recompiles the live site from the config file.
pub struct SiteReloader {
    path: PathBuf,
    site: Arc<ArcSwap<Site>>,
    applied: Option<String>,
    debounce: Duration,
    generation: u64,
}

impl SiteReloader {
    /// The file's current contents are taken as already applied.
    pub fn new(path: &Path, site: Arc<ArcSwap<Site>>) -> Self {
        Self {
            path: path.to_path_buf(),
            site,
            applied: fs::read_to_string(path).ok(),
            debounce: DEFAULT_DEBOUNCE,
            generation: 0,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Number of configs applied since startup.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Re-read the file and swap in the compiled site if it changed.
    pub fn reload(&mut self) -> ReloadOutcome {
        let contents = match fs::read_to_string(&self.path).map_err(ConfigError::Io) {
            Ok(contents) => contents,
            Err(e) => return self.reject(&e),
        };
        if self.applied.as_deref() == Some(contents.as_str()) {
            tracing::debug!(path = ?self.path, "Config contents unchanged");
            return ReloadOutcome::Unchanged;
        }

        let compiled = parse_config(&contents).and_then(|config| {
            let live = self.site.load();
            if config.server.bind_address != live.config().server.bind_address {
                tracing::warn!(
                    bind_address = %config.server.bind_address,
                    "bind_address changes take effect on restart"
                );
            }
            Site::compile(config)
        });

        match compiled {
            Ok(site) => {
                self.site.store(Arc::new(site));
                self.applied = Some(contents);
                self.generation += 1;
                metrics::record_config_reload(true);
                tracing::info!(generation = self.generation, "Configuration reloaded");
                ReloadOutcome::Applied
            }
            Err(e) => self.reject(&e),
        }
    }

    fn reject(&self, error: &ConfigError) -> ReloadOutcome {
        metrics::record_config_reload(false);
        tracing::error!(error = %error, path = ?self.path, "Rejected reloaded configuration, keeping current site");
        ReloadOutcome::Rejected
    }

    /// Reload once per burst of change signals. Returns when the sender side
    /// is dropped.
    pub async fn run(mut self, mut changes: mpsc::UnboundedReceiver<()>) -> Self {
        while changes.recv().await.is_some() {
            let mut open = true;
            while open {
                match tokio::time::timeout(self.debounce, changes.recv()).await {
                    Ok(Some(())) => {}
                    Ok(None) => open = false,
                    Err(_) => break,
                }
            }
            self.reload();
        }
        self
    }
}
