//! End-to-end tests for the face detector against a real directory.

use face_capture_detector::{
    DahuaClassifier, Detector, DetectorConfig, DetectorError, DetectorEvent, DetectorExit,
    DetectorState, DriverRegistry, FaceDetected,
};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const DEBOUNCE: Duration = Duration::from_millis(300);
const FLUSH: Duration = Duration::from_millis(1500);
const WAIT: Duration = Duration::from_secs(5);

fn fast_config(path: &Path) -> DetectorConfig {
    DetectorConfig::new(path)
        .with_fsnotifyloop_timeout(DEBOUNCE)
        .with_mainloop_timeout(FLUSH)
        .with_watchloop_interval(Duration::from_millis(200))
}

fn start(dir: &TempDir) -> Detector {
    Detector::start(fast_config(dir.path()), Arc::new(DahuaClassifier)).unwrap()
}

/// Write a file in a few flushes, the way camera firmware does.
fn write_in_chunks(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).unwrap();
    let chunk = (bytes.len() + 2) / 3;
    for part in bytes.chunks(chunk.max(1)) {
        file.write_all(part).unwrap();
        file.flush().unwrap();
        thread::sleep(Duration::from_millis(50));
    }
    path
}

fn next_face(detector: &Detector) -> FaceDetected {
    match detector.recv_timeout(WAIT) {
        Ok(DetectorEvent::FaceDetected(face)) => face,
        Ok(other) => panic!("unexpected event: {other:?}"),
        Err(e) => panic!("no event: {e}"),
    }
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    check()
}

#[test]
fn test_face_and_background_are_paired() {
    let dir = tempfile::tempdir().unwrap();
    let detector = start(&dir);

    let before = chrono::Utc::now();
    write_in_chunks(&dir, "IMG001[M].jpg", b"face-bytes-0001");
    thread::sleep(Duration::from_millis(600));
    write_in_chunks(&dir, "IMG001[R].jpg", b"background-bytes-0001");

    let face = next_face(&detector);
    assert_eq!(face.face, b"face-bytes-0001");
    assert_eq!(
        face.snapshot.as_deref(),
        Some(&b"background-bytes-0001"[..])
    );

    // Stamped when the face file settled, not when the pair completed.
    assert!(face.timestamp >= before);
    assert!(face.timestamp <= before + chrono::Duration::milliseconds(2000));

    // No standalone copy of the same face follows.
    assert!(detector.recv_timeout(FLUSH * 2).is_err());

    let stats = detector.stats().snapshot();
    assert_eq!(stats.paired_events, 1);
    assert_eq!(stats.standalone_events, 0);
}

#[test]
fn test_lone_face_is_flushed_after_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let detector = start(&dir);

    let written = Instant::now();
    write_in_chunks(&dir, "IMG002[M].jpg", b"lonely-face");

    let face = next_face(&detector);
    assert!(face.is_standalone());
    assert_eq!(face.face, b"lonely-face");
    assert!(written.elapsed() >= DEBOUNCE + FLUSH);
    assert!(detector.stats().snapshot().standalone_events == 1);
}

#[test]
fn test_new_face_flushes_previous_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let detector = start(&dir);

    write_in_chunks(&dir, "IMG003[M].jpg", b"first-face");
    thread::sleep(Duration::from_millis(600));
    write_in_chunks(&dir, "IMG004[M].jpg", b"second-face");

    let first = next_face(&detector);
    assert_eq!(first.face, b"first-face");
    assert!(first.is_standalone());

    thread::sleep(Duration::from_millis(200));
    write_in_chunks(&dir, "IMG004[R].jpg", b"second-scene");

    let second = next_face(&detector);
    assert_eq!(second.face, b"second-face");
    assert_eq!(second.snapshot.as_deref(), Some(&b"second-scene"[..]));
}

#[test]
fn test_irrelevant_files_do_not_disturb_pairing() {
    let dir = tempfile::tempdir().unwrap();
    let detector = start(&dir);

    write_in_chunks(&dir, "IMG005[M].jpg", b"face");
    thread::sleep(Duration::from_millis(400));
    write_in_chunks(&dir, "camera.log", b"heartbeat");
    thread::sleep(Duration::from_millis(400));
    write_in_chunks(&dir, "IMG005[R].jpg", b"scene");

    let face = next_face(&detector);
    assert_eq!(face.face, b"face");
    assert_eq!(face.snapshot.as_deref(), Some(&b"scene"[..]));
    assert!(detector.stats().snapshot().files_ignored >= 1);
}

#[test]
fn test_close_abandons_file_being_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path()).with_fsnotifyloop_timeout(Duration::from_secs(3));
    let detector = Detector::start(config, Arc::new(DahuaClassifier)).unwrap();

    write_in_chunks(&dir, "IMG006[M].jpg", b"half-written");
    assert!(wait_until(Duration::from_secs(2), || {
        detector.stats().pending_files() == 1
    }));

    assert!(detector.close());
    assert_eq!(detector.state(), DetectorState::Closed);
    assert!(detector.recv().is_none());

    let stats = detector.stats().snapshot();
    assert_eq!(stats.pending_files, 0);
    assert_eq!(stats.files_settled, 0);
}

#[test]
fn test_concurrent_close_has_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let detector = Arc::new(start(&dir));

    let closers: Vec<_> = (0..2)
        .map(|_| {
            let detector = detector.clone();
            thread::spawn(move || detector.close())
        })
        .collect();
    let winners = closers
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|closed| *closed)
        .count();

    assert_eq!(winners, 1);
    assert!(matches!(detector.exit_status(), Some(DetectorExit::Closed)));
    assert!(detector.recv().is_none());
    assert!(detector.recv().is_none());
}

#[test]
fn test_unreadable_file_terminates_detector() {
    let dir = tempfile::tempdir().unwrap();
    let detector = start(&dir);

    // The file vanishes before it settles, so the read fails.
    let path = write_in_chunks(&dir, "IMG007[M].jpg", b"gone");
    std::fs::remove_file(&path).unwrap();

    assert!(detector.recv_timeout(WAIT).is_err());
    assert!(detector.recv().is_none());
    match detector.exit_status() {
        Some(DetectorExit::Failed(DetectorError::ReadFailed { path: failed, .. })) => {
            assert_eq!(failed.file_name(), path.file_name())
        }
        other => panic!("unexpected exit status: {other:?}"),
    }
    assert!(!detector.close());
}

#[test]
fn test_waiting_face_is_emitted_before_read_failure() {
    let dir = tempfile::tempdir().unwrap();
    let detector = start(&dir);

    write_in_chunks(&dir, "IMG008[M].jpg", b"kept-face");
    thread::sleep(Duration::from_millis(600));

    // The next face disappears before it settles, so reading it fails.
    let gone = write_in_chunks(&dir, "IMG009[M].jpg", b"vanished-face");
    std::fs::remove_file(&gone).unwrap();

    let face = next_face(&detector);
    assert_eq!(face.face, b"kept-face");
    assert!(face.is_standalone());

    assert!(detector.recv_timeout(WAIT).is_err());
    assert!(detector.recv().is_none());
    match detector.exit_status() {
        Some(DetectorExit::Failed(DetectorError::ReadFailed { path, .. })) => {
            assert_eq!(path.file_name(), gone.file_name())
        }
        other => panic!("unexpected exit status: {other:?}"),
    }
}

#[test]
fn test_removed_directory_terminates_detector() {
    let root = tempfile::tempdir().unwrap();
    let drop_dir = root.path().join("camera");
    std::fs::create_dir(&drop_dir).unwrap();

    let detector = Detector::start(fast_config(&drop_dir), Arc::new(DahuaClassifier)).unwrap();
    std::fs::remove_dir(&drop_dir).unwrap();

    assert!(wait_until(WAIT, || detector.is_closed()));
    assert!(detector.recv().is_none());
    assert!(detector.exit_status().map(|e| e.is_failure()).unwrap_or(false));
}

#[test]
fn test_registry_opens_hikvision_driver() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DriverRegistry::builtin();
    let detector = registry
        .open("hikvision", fast_config(dir.path()))
        .unwrap();

    write_in_chunks(&dir, "ch01_FACE_SNAP.jpg", b"hik-face");
    thread::sleep(Duration::from_millis(500));
    write_in_chunks(&dir, "ch01_FACE_BACKGROUND.jpg", b"hik-scene");

    let face = next_face(&detector);
    assert_eq!(face.face, b"hik-face");
    assert_eq!(face.snapshot.as_deref(), Some(&b"hik-scene"[..]));
}

#[test]
fn test_missing_directory_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Detector::start(
        DetectorConfig::new(dir.path().join("missing")),
        Arc::new(DahuaClassifier),
    );
    assert!(matches!(result, Err(DetectorError::Config(_))));
}
