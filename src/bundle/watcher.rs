//! Component file watcher for hot reload.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashSet;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::bundle::cache::BundleCache;

/// Invalidates cached bundles when their component source changes.
///
/// Files are watched lazily, the first time they are bundled. The parent
/// directory is watched so editors that replace files are still seen.
pub struct ComponentWatcher {
    files: Arc<DashSet<PathBuf>>,
    dirs: Mutex<HashSet<PathBuf>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl ComponentWatcher {
    pub fn new(cache: Arc<BundleCache>) -> Result<Self, notify::Error> {
        let files: Arc<DashSet<PathBuf>> = Arc::new(DashSet::new());
        let watched = Arc::clone(&files);

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    for path in event.paths.iter().filter(|p| watched.contains(*p)) {
                        let removed = cache.invalidate(path);
                        tracing::info!(path = %path.display(), removed, "Component changed, bundle invalidated");
                    }
                }
                Err(e) => tracing::error!("Component watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        Ok(Self {
            files,
            dirs: Mutex::new(HashSet::new()),
            watcher: Mutex::new(Some(watcher)),
        })
    }

    /// Start watching `path` if it is not watched yet.
    ///
    /// The path is only recorded once its directory watch succeeds, so a
    /// failed attempt is retried on the next call.
    pub fn watch(&self, path: &Path) -> Result<(), notify::Error> {
        if self.files.contains(path) {
            return Ok(());
        }

        let mut dirs = self.dirs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = path.parent().filter(|dir| !dirs.contains(*dir)) {
            let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(watcher) = watcher.as_mut() {
                watcher.watch(dir, RecursiveMode::NonRecursive)?;
                dirs.insert(dir.to_path_buf());
                tracing::debug!(dir = %dir.display(), "Watching component directory");
            }
        }

        self.files.insert(path.to_path_buf());
        Ok(())
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    /// Stop watching; later `watch` calls only record the path.
    pub fn stop(&self) {
        if self.watcher.lock().unwrap_or_else(PoisonError::into_inner).take().is_some() {
            tracing::info!(files = self.files.len(), "Component watcher stopped");
        }
    }
}

impl std::fmt::Debug for ComponentWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentWatcher")
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}
