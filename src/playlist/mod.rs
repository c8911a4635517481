//! Folder monitoring for playlist directories. Each watcher maintains a
//! sorted snapshot of the playable media files in one directory and
//! signals a callback whenever the member set changes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::media;

/// Callback invoked with the updated sorted list of absolute file paths
/// whenever the watched directory's playlist changes.
pub type OnChange = Box<dyn Fn(Vec<PathBuf>) + Send + Sync>;

/// Watches a single directory (non-recursive) and maintains a sorted
/// list of playable media files.
pub struct PlaylistWatcher {
    dir: PathBuf,
    files: Arc<RwLock<Vec<PathBuf>>>,
    on_change: Arc<Option<OnChange>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<notify::Result<Event>>>>,
    stop: CancellationToken,
}

impl PlaylistWatcher {
    /// Create a watcher for the given directory. Fails if the OS watch
    /// handle cannot be created. The directory is scanned synchronously
    /// before this returns, so [`files`](Self::files) is valid
    /// immediately; background observation starts only on
    /// [`start`](Self::start).
    pub fn new(dir: impl Into<PathBuf>, on_change: Option<OnChange>) -> Result<Self> {
        let dir = dir.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;

        let files = Arc::new(RwLock::new(scan_dir(&dir)));
        info!(
            "[watcher] scanned {} media files in {}",
            files.read().unwrap().len(),
            dir.display()
        );

        Ok(Self {
            dir,
            files,
            on_change: Arc::new(on_change),
            watcher: Mutex::new(Some(watcher)),
            event_rx: Mutex::new(Some(rx)),
            stop: CancellationToken::new(),
        })
    }

    /// Current sorted list of media file paths (defensive copy).
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.read().unwrap().clone()
    }

    /// Register the directory with the OS watcher and spawn the event
    /// loop. Events that can change the member set (create, remove,
    /// rename) trigger a rescan and the change callback; in-place
    /// content writes are ignored.
    pub fn start(&self) -> Result<()> {
        {
            let mut guard = self.watcher.lock().unwrap();
            match guard.as_mut() {
                Some(w) => w.watch(&self.dir, RecursiveMode::NonRecursive)?,
                None => {
                    warn!("[watcher] start called after stop: {}", self.dir.display());
                    return Ok(());
                }
            }
        }

        let Some(mut rx) = self.event_rx.lock().unwrap().take() else {
            warn!("[watcher] already started: {}", self.dir.display());
            return Ok(());
        };

        let dir = self.dir.clone();
        let files = Arc::clone(&self.files);
        let on_change = Arc::clone(&self.on_change);
        let stop = self.stop.clone();

        tokio::spawn(async move {
            info!("[watcher] monitoring: {}", dir.display());
            loop {
                tokio::select! {
                    _ = stop.cancelled() => {
                        info!("[watcher] stopped: {}", dir.display());
                        break;
                    }
                    event = rx.recv() => match event {
                        Some(Ok(event)) => {
                            if !is_relevant_event(&event.kind) {
                                continue;
                            }
                            debug!("[watcher] event: {:?} {:?}", event.kind, event.paths);
                            let snapshot = scan_dir(&dir);
                            *files.write().unwrap() = snapshot.clone();
                            if let Some(cb) = &*on_change {
                                cb(snapshot);
                            }
                        }
                        Some(Err(e)) => warn!("[watcher] error: {e}"),
                        None => break,
                    }
                }
            }
        });

        Ok(())
    }

    /// Halt observation and release the OS watch handle. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
        self.watcher.lock().unwrap().take();
    }
}

/// Read the directory and build the sorted list of supported media
/// files. Subdirectories and unsupported extensions are skipped. A read
/// error is logged and yields an empty snapshot for this tick.
fn scan_dir(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("[watcher] scan error for {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries.flatten() {
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        let name = entry.file_name();
        if media::is_supported(Path::new(&name)) {
            files.push(dir.join(&name));
        }
    }

    files.sort();
    files
}

/// Create, remove, and rename events can change the playlist; plain
/// content modification cannot.
fn is_relevant_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Any
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.png", "c.txt", "d.webm"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let files = scan_dir(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.mp4", "d.webm"]);
        assert!(files.iter().all(|p| p.starts_with(dir.path())));
    }

    #[test]
    fn scan_of_missing_directory_is_empty() {
        assert!(scan_dir(Path::new("/nonexistent/playlist/dir")).is_empty());
    }

    #[test]
    fn content_writes_are_not_relevant() {
        use notify::event::{DataChange, ModifyKind};
        assert!(!is_relevant_event(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(is_relevant_event(&EventKind::Create(
            notify::event::CreateKind::File
        )));
        assert!(is_relevant_event(&EventKind::Remove(
            notify::event::RemoveKind::File
        )));
        assert!(is_relevant_event(&EventKind::Modify(ModifyKind::Name(
            notify::event::RenameMode::Any
        ))));
    }
}
