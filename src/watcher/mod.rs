//! Directory watching for camera drop directories.
//!
//! This module wraps the OS notification facility for a single directory and
//! turns its output into [`RawFileEvent`]s, which the [`debounce`] table
//! collapses into one "settled" report per written file.

pub mod debounce;
pub mod types;

pub use debounce::{DebounceTable, Expired};
pub use types::{RawFileEvent, RawFileKind};

use crate::detector::DetectorError;
use crossbeam_channel::{unbounded, Receiver};
use notify::event::EventKind;
use notify::{ErrorKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

/// Outcome of one notification from the OS.
#[derive(Debug)]
pub enum WatchSignal {
    /// File activity inside the directory
    Events(Vec<RawFileEvent>),
    /// A per-event problem that leaves the watch usable
    Warning(notify::Error),
    /// The watch is no longer valid
    Fatal(DetectorError),
}

/// A live OS watch on one directory.
pub struct FsWatcher {
    path: PathBuf,
    watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<notify::Event>>,
}

impl FsWatcher {
    /// Begin watching `path` (non-recursively).
    pub fn start(path: &Path) -> Result<Self, DetectorError> {
        let (sender, receiver) = unbounded();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = sender.send(res);
        })
        .map_err(DetectorError::Watch)?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(DetectorError::Watch)?;

        Ok(Self {
            path: path.to_path_buf(),
            watcher,
            receiver,
        })
    }

    /// The watched directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw notifications from the OS. Disconnects once the watch is released.
    pub fn receiver(&self) -> &Receiver<notify::Result<notify::Event>> {
        &self.receiver
    }

    /// Interpret one notification.
    pub fn interpret(&self, res: notify::Result<notify::Event>) -> WatchSignal {
        match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Remove(_))
                    && event.paths.iter().any(|p| p == &self.path)
                {
                    return WatchSignal::Fatal(DetectorError::WatchEnded(self.path.clone()));
                }
                WatchSignal::Events(RawFileEvent::from_notify(&event))
            }
            Err(err) if is_fatal(&err) => WatchSignal::Fatal(DetectorError::Watch(err)),
            Err(err) => WatchSignal::Warning(err),
        }
    }

    /// Check that the watched directory is still there.
    pub fn check_alive(&self) -> Result<(), DetectorError> {
        if self.path.is_dir() {
            Ok(())
        } else {
            Err(DetectorError::WatchEnded(self.path.clone()))
        }
    }

    /// Release the OS watch.
    pub fn stop(mut self) {
        let _ = self.watcher.unwatch(&self.path);
    }
}

/// Errors that mean the watch itself is gone rather than one event failing.
fn is_fatal(err: &notify::Error) -> bool {
    matches!(
        err.kind,
        ErrorKind::PathNotFound
            | ErrorKind::WatchNotFound
            | ErrorKind::MaxFilesWatch
            | ErrorKind::InvalidConfig(_)
    )
}
