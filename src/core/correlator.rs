//! Pairing of face files with their background snapshots.
//!
//! The correlator sees one settled path at a time. A settled face file becomes
//! the single in-flight candidate; the next settled background file completes
//! it. A candidate that is replaced by a newer face, or that waits longer than
//! the flush timeout, is emitted on its own without a snapshot.
//!
//! No threads or clocks live here: the caller passes the current instant, so
//! the policy can be exercised directly in tests.

use crate::classifier::{Classifier, FileClass};
use crate::core::event::FaceDetected;
use crate::detector::DetectorError;
use crate::stats::SharedStats;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// The face waiting for its background file.
#[derive(Debug)]
struct InFlightFace {
    timestamp: DateTime<Utc>,
    face: Vec<u8>,
    since: Instant,
}

impl InFlightFace {
    fn into_event(self, snapshot: Option<Vec<u8>>) -> FaceDetected {
        FaceDetected::new(self.timestamp, self.face, snapshot)
    }
}

/// What one settled file produced.
#[derive(Debug)]
pub struct Settled {
    /// Unpaired candidate pushed out by a newer face; emit it before `result`.
    pub displaced: Option<FaceDetected>,
    /// Completed pair, or the read failure that must stop the detector.
    pub result: Result<Option<FaceDetected>, DetectorError>,
}

impl Settled {
    fn nothing() -> Self {
        Self {
            displaced: None,
            result: Ok(None),
        }
    }

    /// All events in emission order, or the error that follows them.
    pub fn into_events(self) -> (Vec<FaceDetected>, Option<DetectorError>) {
        let mut events: Vec<_> = self.displaced.into_iter().collect();
        match self.result {
            Ok(event) => {
                events.extend(event);
                (events, None)
            }
            Err(e) => (events, Some(e)),
        }
    }
}

/// Face/background pairing state machine.
pub struct Correlator {
    classifier: Arc<dyn Classifier>,
    flush_after: Duration,
    candidate: Option<InFlightFace>,
    stats: SharedStats,
}

impl Correlator {
    pub fn new(classifier: Arc<dyn Classifier>, flush_after: Duration, stats: SharedStats) -> Self {
        Self {
            classifier,
            flush_after,
            candidate: None,
            stats,
        }
    }

    /// Apply the pairing policy to a settled file.
    ///
    /// A candidate displaced by a newer face is taken before the new file is
    /// read, so it is handed back even when that read fails. A read failure
    /// leaves no partial event behind.
    pub fn on_settled(&mut self, path: &Path, now: Instant) -> Settled {
        self.stats.record_file_settled();

        match self.classifier.classify(path) {
            FileClass::FaceFile => {
                let displaced = self.candidate.take().map(|old| {
                    debug!(file = %path.display(), "new face replaces unpaired candidate");
                    self.stats.record_standalone_event();
                    old.into_event(None)
                });

                let result = read_file(path).map(|face| {
                    self.stats.record_face_captured();
                    self.candidate = Some(InFlightFace {
                        timestamp: Utc::now(),
                        face,
                        since: now,
                    });
                    None
                });
                Settled { displaced, result }
            }
            FileClass::BackgroundFile => {
                let Some(candidate) = self.candidate.take() else {
                    debug!(file = %path.display(), "background without face candidate");
                    self.stats.record_file_ignored();
                    return Settled::nothing();
                };

                let result = read_file(path).map(|snapshot| {
                    self.stats.record_paired_event();
                    Some(candidate.into_event(Some(snapshot)))
                });
                Settled {
                    displaced: None,
                    result,
                }
            }
            FileClass::Irrelevant => {
                self.stats.record_file_ignored();
                Settled::nothing()
            }
        }
    }

    /// Flush the candidate if it has waited for the full timeout.
    pub fn on_tick(&mut self, now: Instant) -> Option<FaceDetected> {
        let due = self.flush_deadline().map(|d| now >= d).unwrap_or(false);
        if !due {
            return None;
        }

        let candidate = self.candidate.take()?;
        debug!("flushing face candidate without background");
        self.stats.record_standalone_event();
        Some(candidate.into_event(None))
    }

    /// When the current candidate must be flushed, if there is one.
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.candidate.as_ref().map(|c| c.since + self.flush_after)
    }

    pub fn has_candidate(&self) -> bool {
        self.candidate.is_some()
    }

    /// Drop the candidate without emitting it. Returns whether one existed.
    pub fn discard(&mut self) -> bool {
        self.candidate.take().is_some()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, DetectorError> {
    std::fs::read(path).map_err(|source| DetectorError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DahuaClassifier;
    use crate::stats::DetectorStats;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const FLUSH: Duration = Duration::from_secs(7);

    fn setup() -> (TempDir, Correlator, SharedStats) {
        let dir = tempfile::tempdir().unwrap();
        let stats = Arc::new(DetectorStats::new());
        let correlator = Correlator::new(Arc::new(DahuaClassifier), FLUSH, stats.clone());
        (dir, correlator, stats)
    }

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_face_then_background_pairs() {
        let (dir, mut correlator, stats) = setup();
        let face = write(&dir, "IMG001[M].jpg", b"face-1");
        let background = write(&dir, "IMG001[R].jpg", b"scene-1");
        let t0 = Instant::now();

        assert!(correlator.on_settled(&face, t0).result.unwrap().is_none());
        assert!(correlator.has_candidate());

        let event = correlator
            .on_settled(&background, t0 + Duration::from_secs(3))
            .result
            .unwrap()
            .unwrap();
        assert_eq!(event.face, b"face-1");
        assert_eq!(event.snapshot.as_deref(), Some(&b"scene-1"[..]));
        assert!(!correlator.has_candidate());

        // Nothing left to flush afterwards.
        assert!(correlator.on_tick(t0 + FLUSH * 2).is_none());
        assert_eq!(stats.snapshot().paired_events, 1);
        assert_eq!(stats.snapshot().standalone_events, 0);
    }

    #[test]
    fn test_second_face_flushes_first() {
        let (dir, mut correlator, _) = setup();
        let f1 = write(&dir, "IMG001[M].jpg", b"face-1");
        let f2 = write(&dir, "IMG002[M].jpg", b"face-2");
        let b2 = write(&dir, "IMG002[R].jpg", b"scene-2");
        let t0 = Instant::now();

        correlator.on_settled(&f1, t0).result.unwrap();
        let settled = correlator.on_settled(&f2, t0);
        let flushed = settled.displaced.unwrap();
        assert_eq!(flushed.face, b"face-1");
        assert!(flushed.is_standalone());
        assert!(settled.result.unwrap().is_none());

        let paired = correlator.on_settled(&b2, t0).result.unwrap().unwrap();
        assert_eq!(paired.face, b"face-2");
        assert_eq!(paired.snapshot.as_deref(), Some(&b"scene-2"[..]));
    }

    #[test]
    fn test_flush_waits_for_full_timeout() {
        let (dir, mut correlator, stats) = setup();
        let face = write(&dir, "IMG001[M].jpg", b"lonely");
        let t0 = Instant::now();

        correlator.on_settled(&face, t0).result.unwrap();
        assert_eq!(correlator.flush_deadline(), Some(t0 + FLUSH));
        assert!(correlator
            .on_tick(t0 + FLUSH - Duration::from_millis(1))
            .is_none());

        let event = correlator.on_tick(t0 + FLUSH).unwrap();
        assert_eq!(event.face, b"lonely");
        assert!(event.is_standalone());
        assert!(correlator.flush_deadline().is_none());
        assert_eq!(stats.snapshot().standalone_events, 1);
    }

    #[test]
    fn test_background_without_candidate_is_ignored() {
        let (dir, mut correlator, stats) = setup();
        let background = write(&dir, "IMG001[R].jpg", b"scene");

        assert!(correlator
            .on_settled(&background, Instant::now())
            .result
            .unwrap()
            .is_none());
        assert!(!correlator.has_candidate());
        assert_eq!(stats.snapshot().files_ignored, 1);
    }

    #[test]
    fn test_irrelevant_file_leaves_candidate_alone() {
        let (dir, mut correlator, _) = setup();
        let face = write(&dir, "IMG001[M].jpg", b"face");
        let other = write(&dir, "notes.txt", b"hello");
        let background = write(&dir, "IMG001[R].jpg", b"scene");
        let t0 = Instant::now();

        correlator.on_settled(&face, t0).result.unwrap();
        assert!(correlator
            .on_settled(&other, t0 + Duration::from_secs(1))
            .result
            .unwrap()
            .is_none());
        // The deadline still counts from the face, not the irrelevant file.
        assert_eq!(correlator.flush_deadline(), Some(t0 + FLUSH));

        let event = correlator
            .on_settled(&background, t0)
            .result
            .unwrap()
            .unwrap();
        assert_eq!(event.face, b"face");
    }

    #[test]
    fn test_unreadable_face_is_fatal() {
        let (dir, mut correlator, _) = setup();
        let missing = dir.path().join("IMG009[M].jpg");

        match correlator.on_settled(&missing, Instant::now()).result {
            Err(DetectorError::ReadFailed { path, .. }) => assert_eq!(path, missing),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!correlator.has_candidate());
    }

    #[test]
    fn test_displaced_face_survives_unreadable_replacement() {
        let (dir, mut correlator, stats) = setup();
        let f1 = write(&dir, "IMG001[M].jpg", b"face-1");
        let t0 = Instant::now();
        correlator.on_settled(&f1, t0).result.unwrap();

        let missing = dir.path().join("IMG002[M].jpg");
        let (events, failure) = correlator.on_settled(&missing, t0).into_events();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].face, b"face-1");
        assert!(events[0].is_standalone());
        assert!(matches!(failure, Some(DetectorError::ReadFailed { path, .. }) if path == missing));
        assert!(!correlator.has_candidate());
        assert_eq!(stats.snapshot().standalone_events, 1);
    }

    #[test]
    fn test_unreadable_background_is_fatal() {
        let (dir, mut correlator, _) = setup();
        let face = write(&dir, "IMG001[M].jpg", b"face");
        correlator.on_settled(&face, Instant::now()).result.unwrap();

        let missing = dir.path().join("IMG001[R].jpg");
        assert!(matches!(
            correlator.on_settled(&missing, Instant::now()).result,
            Err(DetectorError::ReadFailed { .. })
        ));
    }

    #[test]
    fn test_discard() {
        let (dir, mut correlator, _) = setup();
        let face = write(&dir, "IMG001[M].jpg", b"face");
        correlator.on_settled(&face, Instant::now()).result.unwrap();

        assert!(correlator.discard());
        assert!(!correlator.discard());
    }
}
