use std::path::{Path, PathBuf};

use asset_ingest_core::IngestError;
use notify::event::CreateKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Filesystem watcher over the category folders of a root directory.
///
/// Uses filesystem events (inotify on Linux, FSEvents on macOS, etc.).
/// Each top-level subdirectory of the root is watched non-recursively, so
/// files in nested folders (including the archive subdirectory) are not seen.
pub struct DirectoryWatcher {
    directories: Vec<PathBuf>,
    /// Keep watcher alive (it stops when dropped)
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Start watching every subdirectory of `root`.
    ///
    /// Paths of newly created files are sent to `tx` from the notify thread.
    pub fn start(root: &Path, tx: mpsc::Sender<PathBuf>) -> Result<Self, IngestError> {
        let directories = list_subdirectories(root)?;

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if !is_file_creation(&event.kind) {
                        return;
                    }
                    for path in event.paths {
                        if path.is_dir() {
                            continue;
                        }
                        info!("New file detected: {}", path.display());
                        if tx.blocking_send(path).is_err() {
                            debug!("Event receiver closed, dropping create event");
                        }
                    }
                }
                Err(e) => {
                    warn!("Watch error: {}", e);
                }
            },
            Config::default(),
        )
        .map_err(|e| IngestError::Watch(format!("Failed to create watcher: {}", e)))?;

        for dir in &directories {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    IngestError::Watch(format!("Failed to watch {}: {}", dir.display(), e))
                })?;
            info!("Watching folder: {}", dir.display());
        }

        Ok(Self {
            directories,
            _watcher: watcher,
        })
    }

    /// The folders being watched.
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

fn is_file_creation(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(k) if *k != CreateKind::Folder)
}

fn list_subdirectories(root: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let entries = std::fs::read_dir(root).map_err(|e| {
        IngestError::Watch(format!("Failed to list root {}: {}", root.display(), e))
    })?;

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Enqueue the files already sitting in the watched folders.
///
/// Used at startup to pick up files left behind by earlier failures.
/// Returns how many paths were enqueued.
pub async fn scan_existing(directories: &[PathBuf], tx: &mpsc::Sender<PathBuf>) -> usize {
    let mut count = 0;
    for dir in directories {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to scan {}: {}", dir.display(), e);
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to scan {}: {}", dir.display(), e);
                    break;
                }
            };
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if tx.send(entry.path()).await.is_err() {
                return count;
            }
            count += 1;
        }
    }
    count
}
