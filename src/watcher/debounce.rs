//! Per-file write debouncing.
//!
//! Cameras write an image in several flushes and the file system gives no
//! "transfer complete" signal. Each newly created file therefore gets a settle
//! timer running on its own thread; every write to the file restarts the timer
//! and the file is reported as settled once it stays quiet for the whole
//! window.
//!
//! The [`DebounceTable`] owns every pending entry. Timer threads never touch
//! the table; once they have handed their path on they send an [`Expired`]
//! notice back so the owner can drop the entry.

use crate::stats::SharedStats;
use crate::watcher::types::{RawFileEvent, RawFileKind};
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Sent by a timer thread after its path has been handed to the correlator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub path: PathBuf,
    id: u64,
}

/// A file that is still being written.
struct PendingFile {
    id: u64,
    reset: Sender<()>,
    handle: JoinHandle<()>,
}

/// Owner of all pending files and their settle timers.
pub struct DebounceTable {
    pending: HashMap<PathBuf, PendingFile>,
    next_id: u64,
    window: Duration,
    settled_tx: Sender<PathBuf>,
    expired_tx: Sender<Expired>,
    shutdown: Receiver<()>,
    stats: SharedStats,
}

impl DebounceTable {
    /// Create an empty table.
    ///
    /// Settled paths are sent on `settled_tx`, expiry notices on `expired_tx`.
    /// Timers abandon their file as soon as `shutdown` disconnects.
    pub fn new(
        window: Duration,
        settled_tx: Sender<PathBuf>,
        expired_tx: Sender<Expired>,
        shutdown: Receiver<()>,
        stats: SharedStats,
    ) -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 0,
            window,
            settled_tx,
            expired_tx,
            shutdown,
            stats,
        }
    }

    /// Route a raw event to the matching timer, starting one on creation.
    pub fn dispatch(&mut self, event: RawFileEvent) {
        match event.kind {
            RawFileKind::Created => self.track(event.path),
            RawFileKind::Modified => self.touch(&event.path),
        }
    }

    /// Number of files currently pending.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.pending.contains_key(path)
    }

    /// Drop the entry a finished timer reported for, unless it was replaced.
    pub fn expire(&mut self, expired: Expired) {
        let matches = self
            .pending
            .get(&expired.path)
            .map(|p| p.id == expired.id)
            .unwrap_or(false);
        if !matches {
            return;
        }

        if let Some(entry) = self.pending.remove(&expired.path) {
            if entry.handle.join().is_err() {
                error!(file = %expired.path.display(), "settle timer panicked");
            }
        }
    }

    /// Cancel every pending timer and wait for the threads to exit.
    ///
    /// Must only be called once the shutdown channel has disconnected, so
    /// timers blocked on handing off their path wake up.
    pub fn shutdown(&mut self) {
        let count = self.pending.len();
        for (path, entry) in self.pending.drain() {
            drop(entry.reset);
            if entry.handle.join().is_err() {
                error!(file = %path.display(), "settle timer panicked");
            }
        }
        if count > 0 {
            debug!(count, "abandoned pending files");
        }
    }

    fn track(&mut self, path: PathBuf) {
        if let Some(entry) = self.pending.get(&path) {
            match entry.reset.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {
                    debug!(file = %path.display(), "duplicate create, timer reset");
                    return;
                }
                // The old timer already handed the file on; start over.
                Err(TrySendError::Disconnected(())) => {}
            }
        }

        self.next_id += 1;
        let id = self.next_id;
        let (reset_tx, reset_rx) = bounded(1);

        self.stats.pending_file_started();
        let guard = PendingGuard(self.stats.clone());
        let timer = SettleTimer {
            path: path.clone(),
            id,
            window: self.window,
            reset: reset_rx,
            settled_tx: self.settled_tx.clone(),
            expired_tx: self.expired_tx.clone(),
            shutdown: self.shutdown.clone(),
        };

        let spawned = thread::Builder::new()
            .name("settle-timer".to_string())
            .spawn(move || {
                let _guard = guard;
                timer.run();
            });

        match spawned {
            Ok(handle) => {
                debug!(file = %path.display(), "tracking new file");
                self.pending.insert(
                    path,
                    PendingFile {
                        id,
                        reset: reset_tx,
                        handle,
                    },
                );
            }
            Err(e) => error!(file = %path.display(), error = %e, "failed to spawn settle timer"),
        }
    }

    fn touch(&mut self, path: &Path) {
        let Some(entry) = self.pending.get(path) else {
            warn!(file = %path.display(), "no pending file for write");
            return;
        };

        // A full slot already carries a reset for this timer.
        if let Err(TrySendError::Disconnected(())) = entry.reset.try_send(()) {
            debug!(file = %path.display(), "write after file settled");
        }
    }
}

/// Decrements the pending gauge when a timer thread ends, however it ends.
struct PendingGuard(SharedStats);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending_file_finished();
    }
}

struct SettleTimer {
    path: PathBuf,
    id: u64,
    window: Duration,
    reset: Receiver<()>,
    settled_tx: Sender<PathBuf>,
    expired_tx: Sender<Expired>,
    shutdown: Receiver<()>,
}

impl SettleTimer {
    fn run(self) {
        'debounce: loop {
            loop {
                select! {
                    recv(self.reset) -> msg => match msg {
                        Ok(()) => debug!(file = %self.path.display(), "file syncing"),
                        Err(_) => return,
                    },
                    recv(self.shutdown) -> _ => return,
                    default(self.window) => break,
                }
            }

            // The correlator may be busy; a write arriving meanwhile restarts
            // the quiet period.
            loop {
                select! {
                    send(self.settled_tx, self.path.clone()) -> res => {
                        if res.is_err() {
                            return;
                        }
                        break 'debounce;
                    }
                    recv(self.reset) -> msg => match msg {
                        Ok(()) => continue 'debounce,
                        Err(_) => return,
                    },
                    recv(self.shutdown) -> _ => return,
                }
            }
        }

        debug!(file = %self.path.display(), "file settled");
        // Close the reset channel first so a re-create sees this timer as done.
        drop(self.reset);
        let _ = self.expired_tx.send(Expired {
            path: self.path,
            id: self.id,
        });
    }
}
