//! Keymap hot reload.
//!
//! [`ConfigWatcher`] polls the keymap file's modification time.  When it
//! changes, the file is loaded and resolved here, off the session task, and
//! only a valid result is posted as [`SessionCommand::Reload`].  A file that
//! fails to parse or validate is logged and the running configuration stays
//! in place.  When the reload is applied is up to the session, which waits for
//! an idle channel.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use keytouch_core::SessionConfig;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::storage::config::{load_session_config, StorageError};
use crate::application::session_loop::SessionCommand;

/// Polls one keymap file for changes.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    period: Duration,
    last_seen: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Creates a watcher.  The file's current state is the baseline, so the
    /// configuration the session started with is not posted again.
    pub fn new(path: impl Into<PathBuf>, period: Duration) -> Self {
        let path = path.into();
        let last_seen = modified(&path);
        Self {
            path,
            period,
            last_seen,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks the file once.  Returns a validated configuration if it changed.
    ///
    /// # Errors
    ///
    /// Returns the load or validation error for a changed file.  The change
    /// is still recorded, so the same broken file is not reported twice.
    pub fn poll(&mut self) -> Result<Option<SessionConfig>, StorageError> {
        let current = modified(&self.path);
        if current == self.last_seen {
            return Ok(None);
        }
        self.last_seen = current;
        if current.is_none() {
            debug!("keymap {} removed; keeping running config", self.path.display());
            return Ok(None);
        }
        let (_, session) = load_session_config(&self.path)?;
        Ok(Some(session))
    }

    /// Polls every period until the session channel closes.
    pub async fn run(mut self, commands: mpsc::Sender<SessionCommand>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("watching {} for changes", self.path.display());

        while !commands.is_closed() {
            ticker.tick().await;
            match self.poll() {
                Ok(Some(config)) => {
                    info!("keymap changed, requesting reload");
                    if commands
                        .send(SessionCommand::Reload(Box::new(config)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("keymap change rejected, keeping running config: {e}"),
            }
        }
        debug!("config watcher stopped");
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
