//! Detector lifecycle.
//!
//! A [`Detector`] runs two long-lived threads plus one short-lived settle
//! timer per file being written:
//!
//! ```text
//!  OS notify ──▶ watch loop ──(Created/Modified)──▶ settle timers
//!                    ▲                                   │ settled path
//!                    └──────────── expired ◀─────────────┤
//!                                                        ▼
//!                     consumer ◀──(events)── main loop (correlator + flush tick)
//! ```
//!
//! Every channel between them is a blocking handoff. Closing the detector
//! disconnects a shared shutdown channel, which wakes every thread wherever it
//! is blocked.

use crate::classifier::Classifier;
use crate::config::{ConfigError, DetectorConfig};
use crate::core::{Correlator, DetectorEvent, FaceDetected};
use crate::stats::{DetectorStats, SharedStats};
use crate::watcher::{DebounceTable, Expired, FsWatcher, WatchSignal};
use crossbeam_channel::{
    after, bounded, never, select, unbounded, Receiver, RecvTimeoutError, Sender,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Errors raised by the detector and its drivers.
#[derive(Debug)]
pub enum DetectorError {
    /// Invalid configuration; the detector was never started
    Config(ConfigError),
    /// The OS watch could not be set up or stopped working
    Watch(notify::Error),
    /// The watched directory disappeared
    WatchEnded(PathBuf),
    /// A settled file could not be read
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A detector thread could not be started
    Spawn(std::io::Error),
    /// No driver is registered under this name
    UnsupportedDriver(String),
    /// The event is not of the requested kind; reserved for event kinds
    /// beyond face captures
    UnexpectedEvent,
}

impl std::fmt::Display for DetectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorError::Config(e) => write!(f, "Configuration error: {e}"),
            DetectorError::Watch(e) => write!(f, "File watch error: {e}"),
            DetectorError::WatchEnded(path) => {
                write!(f, "Watched directory is gone: {}", path.display())
            }
            DetectorError::ReadFailed { path, source } => {
                write!(f, "Failed to read {}: {source}", path.display())
            }
            DetectorError::Spawn(e) => write!(f, "Failed to spawn detector thread: {e}"),
            DetectorError::UnsupportedDriver(name) => {
                write!(f, "Unsupported face detector driver: {name}")
            }
            DetectorError::UnexpectedEvent => write!(f, "Unexpected event"),
        }
    }
}

impl std::error::Error for DetectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DetectorError::Config(e) => Some(e),
            DetectorError::Watch(e) => Some(e),
            DetectorError::ReadFailed { source, .. } => Some(source),
            DetectorError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for DetectorError {
    fn from(e: ConfigError) -> Self {
        DetectorError::Config(e)
    }
}

/// Why a detector stopped.
#[derive(Debug)]
pub enum DetectorExit {
    /// [`Detector::close`] was called
    Closed,
    /// A fatal watch or read error ended the detector
    Failed(DetectorError),
}

impl DetectorExit {
    pub fn is_failure(&self) -> bool {
        matches!(self, DetectorExit::Failed(_))
    }

    pub fn error(&self) -> Option<&DetectorError> {
        match self {
            DetectorExit::Closed => None,
            DetectorExit::Failed(e) => Some(e),
        }
    }
}

impl std::fmt::Display for DetectorExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorExit::Closed => write!(f, "closed"),
            DetectorExit::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Lifecycle state of a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Running,
    /// Shutdown has been requested; threads are still winding down
    Closing,
    Closed,
}

/// One-shot shutdown signal shared by all detector threads.
///
/// The first trigger records the exit reason and drops the only sender, so
/// every `recv` on [`Shutdown::signal`] returns immediately from then on.
struct Shutdown {
    exit: OnceLock<DetectorExit>,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl Shutdown {
    fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            exit: OnceLock::new(),
            trigger: Mutex::new(Some(trigger)),
            signal,
        }
    }

    /// Returns `false` if shutdown had already been triggered.
    fn trigger(&self, exit: DetectorExit) -> bool {
        if self.exit.set(exit).is_err() {
            return false;
        }
        let sender = self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);
        true
    }

    fn is_triggered(&self) -> bool {
        self.exit.get().is_some()
    }

    fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

/// A running face detector bound to one directory.
pub struct Detector {
    path: PathBuf,
    events: Receiver<DetectorEvent>,
    shutdown: Arc<Shutdown>,
    stats: SharedStats,
    threads: Mutex<Vec<JoinHandle<()>>>,
    live: Arc<AtomicUsize>,
}

/// Counts a detector thread as live until its body returns.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn enter(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live.clone())
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Detector {
    /// Validate `config`, start watching its directory and spawn the detector
    /// threads.
    pub fn start(
        config: DetectorConfig,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, DetectorError> {
        config.validate()?;
        let watcher = FsWatcher::start(&config.path)?;

        let stats = Arc::new(DetectorStats::new());
        let shutdown = Arc::new(Shutdown::new());

        let (settled_tx, settled_rx) = bounded(0);
        let (expired_tx, expired_rx) = unbounded();
        let (events_tx, events_rx) = bounded(0);

        let table = DebounceTable::new(
            config.fsnotifyloop_timeout,
            settled_tx,
            expired_tx,
            shutdown.signal().clone(),
            stats.clone(),
        );
        let watch_loop = WatchLoop {
            watcher,
            table,
            expired_rx,
            interval: config.watchloop_interval,
            shutdown: shutdown.clone(),
            stats: stats.clone(),
        };
        let main_loop = MainLoop {
            correlator: Correlator::new(classifier, config.mainloop_timeout, stats.clone()),
            settled_rx,
            events_tx,
            shutdown: shutdown.clone(),
        };

        let live = Arc::new(AtomicUsize::new(0));

        let guard = LiveGuard::enter(&live);
        let watch_handle = thread::Builder::new()
            .name("face-watchloop".to_string())
            .spawn(move || {
                let _guard = guard;
                watch_loop.run();
            })
            .map_err(DetectorError::Spawn)?;

        let guard = LiveGuard::enter(&live);
        let main_handle = match thread::Builder::new()
            .name("face-mainloop".to_string())
            .spawn(move || {
                let _guard = guard;
                main_loop.run();
            }) {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.trigger(DetectorExit::Closed);
                let _ = watch_handle.join();
                return Err(DetectorError::Spawn(e));
            }
        };

        info!(path = %config.path.display(), "face detector started");

        Ok(Self {
            path: config.path,
            events: events_rx,
            shutdown,
            stats,
            threads: Mutex::new(vec![watch_handle, main_handle]),
            live,
        })
    }

    /// Detection events, in emission order.
    ///
    /// The channel is unbuffered: the detector waits for the consumer before
    /// it processes the next file. It disconnects exactly once, when the
    /// detector terminates for any reason.
    pub fn events(&self) -> &Receiver<DetectorEvent> {
        &self.events
    }

    /// Block for the next event; `None` once the detector has terminated.
    pub fn recv(&self) -> Option<DetectorEvent> {
        self.events.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<DetectorEvent, RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Stop the detector and wait for its threads to exit.
    ///
    /// Pending files and an unpaired face candidate are abandoned. Safe to call
    /// repeatedly and from several threads; every call returns only once the
    /// threads have exited, and only the call that actually stopped a running
    /// detector returns `true`.
    pub fn close(&self) -> bool {
        let closed = self.shutdown.trigger(DetectorExit::Closed);
        if closed {
            debug!(path = %self.path.display(), "closing face detector");
        }

        // Held across the joins so a concurrent caller waits for them too.
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in threads.drain(..) {
            if handle.join().is_err() {
                error!("face detector thread panicked");
            }
        }

        closed
    }

    pub fn state(&self) -> DetectorState {
        if !self.shutdown.is_triggered() {
            DetectorState::Running
        } else if self.live.load(Ordering::SeqCst) > 0 {
            DetectorState::Closing
        } else {
            DetectorState::Closed
        }
    }

    /// True once shutdown has started, whether by `close` or a fatal error.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Why the detector stopped; `None` while it is running.
    pub fn exit_status(&self) -> Option<&DetectorExit> {
        self.shutdown.exit.get()
    }

    pub fn stats(&self) -> &DetectorStats {
        &self.stats
    }

    /// The watched directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Detector {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

/// Reads OS notifications and owns the pending-file table.
struct WatchLoop {
    watcher: FsWatcher,
    table: DebounceTable,
    expired_rx: Receiver<Expired>,
    interval: Duration,
    shutdown: Arc<Shutdown>,
    stats: SharedStats,
}

impl WatchLoop {
    fn run(mut self) {
        loop {
            select! {
                recv(self.watcher.receiver()) -> msg => {
                    let Ok(res) = msg else {
                        self.fail(DetectorError::WatchEnded(self.watcher.path().to_path_buf()));
                        break;
                    };
                    match self.watcher.interpret(res) {
                        WatchSignal::Events(events) => {
                            for event in events {
                                self.stats.record_raw_event();
                                self.table.dispatch(event);
                            }
                        }
                        WatchSignal::Warning(err) => {
                            warn!(error = %err, "receive fswatcher error");
                        }
                        WatchSignal::Fatal(err) => {
                            self.fail(err);
                            break;
                        }
                    }
                }
                recv(self.expired_rx) -> msg => {
                    if let Ok(expired) = msg {
                        self.table.expire(expired);
                    }
                }
                recv(self.shutdown.signal()) -> _ => break,
                default(self.interval) => {
                    trace!(pending = self.table.len(), "watch loop idle");
                    if let Err(err) = self.watcher.check_alive() {
                        self.fail(err);
                        break;
                    }
                }
            }
        }

        self.table.shutdown();
        self.watcher.stop();
    }

    fn fail(&self, err: DetectorError) {
        error!(error = %err, "file watch terminated");
        self.shutdown.trigger(DetectorExit::Failed(err));
    }
}

/// Runs the correlator and the candidate flush tick.
struct MainLoop {
    correlator: Correlator,
    settled_rx: Receiver<PathBuf>,
    events_tx: Sender<DetectorEvent>,
    shutdown: Arc<Shutdown>,
}

impl MainLoop {
    fn run(mut self) {
        while !self.shutdown.is_triggered() {
            let flush = match self.correlator.flush_deadline() {
                Some(deadline) => after(deadline.saturating_duration_since(Instant::now())),
                None => never(),
            };

            select! {
                recv(self.settled_rx) -> msg => {
                    let Ok(path) = msg else {
                        self.shutdown.trigger(DetectorExit::Closed);
                        break;
                    };
                    let (events, failure) =
                        self.correlator.on_settled(&path, Instant::now()).into_events();
                    if !events.into_iter().all(|event| self.emit(event)) {
                        break;
                    }
                    if let Some(err) = failure {
                        error!(file = %path.display(), error = %err, "failed to read file");
                        self.shutdown.trigger(DetectorExit::Failed(err));
                        break;
                    }
                }
                recv(flush) -> _ => {
                    if let Some(event) = self.correlator.on_tick(Instant::now()) {
                        if !self.emit(event) {
                            break;
                        }
                    }
                }
                recv(self.shutdown.signal()) -> _ => break,
            }
        }

        if self.correlator.discard() {
            debug!("discarded unflushed face candidate");
        }
        debug!("face detector closed");
    }

    /// Hand an event to the consumer. Returns `false` if the detector is
    /// shutting down instead.
    fn emit(&self, event: FaceDetected) -> bool {
        if self.shutdown.is_triggered() {
            return false;
        }
        select! {
            send(self.events_tx, DetectorEvent::from(event)) -> res => res.is_ok(),
            recv(self.shutdown.signal()) -> _ => false,
        }
    }
}
