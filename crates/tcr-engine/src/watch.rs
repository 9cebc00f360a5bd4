//! Filesystem-change collaborator.
//!
//! [`NotifyWatcher`] bridges `notify` OS events into an async
//! `wait_for_change()` the driver loop can select on alongside its
//! interrupt signal. Events are filtered down to create/modify/remove of
//! files matching the session's language before they wake the loop.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::domain::{Result, TcrError};

/// Blocking-style change notification consumed by the driver loop.
#[async_trait]
pub trait SourceWatcher: Send + Sync {
    /// Resolves with the path of the next relevant change. An error means
    /// the watch backend is gone and the role should stop.
    async fn wait_for_change(&self) -> Result<PathBuf>;
}

/// Whether an OS event kind represents a content change we care about.
fn is_change_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Watcher that never reports a change, for sessions that do not watch
/// the filesystem (one-shot, navigator).
pub struct IdleWatcher;

#[async_trait]
impl SourceWatcher for IdleWatcher {
    async fn wait_for_change(&self) -> Result<PathBuf> {
        std::future::pending().await
    }
}

/// `notify`-backed [`SourceWatcher`].
pub struct NotifyWatcher {
    // Keeps the OS watches alive for the lifetime of this value.
    _watcher: std::sync::Mutex<RecommendedWatcher>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PathBuf>>,
}

impl NotifyWatcher {
    /// Watch `dirs` recursively, forwarding paths accepted by `filter`.
    pub fn new<F>(dirs: &[PathBuf], filter: F) -> Result<Self>
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let Ok(event) = result else { return };
            if !is_change_kind(&event.kind) {
                return;
            }
            for path in event.paths {
                if filter(&path) {
                    trace!(path = %path.display(), "source change detected");
                    // Receiver gone means the session is over.
                    let _ = tx.send(path);
                }
            }
        })
        .map_err(|e| TcrError::Watcher(e.to_string()))?;

        // Not every workspace has every layout directory (a bin-only
        // crate has no tests/); watch what exists.
        let mut watched = 0usize;
        for dir in dirs {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "skipping missing watch directory");
                continue;
            }
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .map_err(|e| TcrError::Watcher(format!("cannot watch {}: {e}", dir.display())))?;
            watched += 1;
        }
        if watched == 0 {
            return Err(TcrError::Watcher(
                "no watchable directory found".to_string(),
            ));
        }

        Ok(Self {
            _watcher: std::sync::Mutex::new(watcher),
            rx: tokio::sync::Mutex::new(rx),
        })
    }
}

#[async_trait]
impl SourceWatcher for NotifyWatcher {
    async fn wait_for_change(&self) -> Result<PathBuf> {
        let mut rx = self.rx.lock().await;
        let mut path = rx
            .recv()
            .await
            .ok_or_else(|| TcrError::Watcher("watch channel closed".to_string()))?;
        // Changes that piled up while a cycle ran collapse into one wake.
        while let Ok(later) = rx.try_recv() {
            path = later;
        }
        Ok(path)
    }
}
