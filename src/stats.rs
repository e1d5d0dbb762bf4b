//! In-memory detector statistics.
//!
//! Counters are updated from the watcher, debounce and correlator threads and
//! can be read at any time, including after the detector has closed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for one detector instance.
#[derive(Debug)]
pub struct DetectorStats {
    /// Raw created/modified notifications received
    raw_events: AtomicU64,
    /// Files that went quiet long enough to be considered complete
    files_settled: AtomicU64,
    /// Face files read into a candidate
    faces_captured: AtomicU64,
    /// Events emitted with both face and snapshot
    paired_events: AtomicU64,
    /// Events emitted with a face only
    standalone_events: AtomicU64,
    /// Settled files that were not part of a pair
    files_ignored: AtomicU64,
    /// Settle timers currently alive
    pending_files: AtomicU64,
    started_at: DateTime<Utc>,
}

impl DetectorStats {
    pub fn new() -> Self {
        Self {
            raw_events: AtomicU64::new(0),
            files_settled: AtomicU64::new(0),
            faces_captured: AtomicU64::new(0),
            paired_events: AtomicU64::new(0),
            standalone_events: AtomicU64::new(0),
            files_ignored: AtomicU64::new(0),
            pending_files: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_raw_event(&self) {
        self.raw_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_settled(&self) {
        self.files_settled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_face_captured(&self) {
        self.faces_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_paired_event(&self) {
        self.paired_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_standalone_event(&self) {
        self.standalone_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_ignored(&self) {
        self.files_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn pending_file_started(&self) {
        self.pending_files.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn pending_file_finished(&self) {
        self.pending_files.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of settle timers still alive.
    pub fn pending_files(&self) -> u64 {
        self.pending_files.load(Ordering::SeqCst)
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            raw_events: self.raw_events.load(Ordering::Relaxed),
            files_settled: self.files_settled.load(Ordering::Relaxed),
            faces_captured: self.faces_captured.load(Ordering::Relaxed),
            paired_events: self.paired_events.load(Ordering::Relaxed),
            standalone_events: self.standalone_events.load(Ordering::Relaxed),
            files_ignored: self.files_ignored.load(Ordering::Relaxed),
            pending_files: self.pending_files(),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Detector Statistics:\n\
             - Raw file events: {}\n\
             - Files settled: {}\n\
             - Faces captured: {}\n\
             - Paired events: {}\n\
             - Standalone events: {}\n\
             - Files ignored: {}\n\
             - Uptime: {} seconds",
            stats.raw_events,
            stats.files_settled,
            stats.faces_captured,
            stats.paired_events,
            stats.standalone_events,
            stats.files_ignored,
            stats.uptime_secs
        )
    }
}

impl Default for DetectorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the detector counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub raw_events: u64,
    pub files_settled: u64,
    pub faces_captured: u64,
    pub paired_events: u64,
    pub standalone_events: u64,
    pub files_ignored: u64,
    pub pending_files: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared statistics.
pub type SharedStats = Arc<DetectorStats>;
