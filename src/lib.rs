//! Face Capture Detector - pairs camera face crops with background snapshots.
//!
//! IP cameras with face detection drop two JPEG files per capture into a
//! directory (usually over FTP): a small face crop first and, some time later,
//! the full-scene background. This library watches that directory and turns
//! the noisy stream of create/write notifications into one event per capture.
//!
//! # Guarantees
//!
//! - **Complete files only**: a file is read only after no write has touched it
//!   for the debounce window
//! - **Arrival-order pairing**: a face is paired with the next background file
//! - **Bounded waiting**: a face without a background is emitted on its own
//!   after the flush timeout, or as soon as a newer face replaces it
//! - **Clean shutdown**: closing the detector stops every thread and closes the
//!   event channel exactly once
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Face Capture Detector                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Watcher   │──▶│  Debounce   │──▶│ Correlator  │──▶ events
//! │  │  (notify)   │   │ (per file)  │   │ (pairing)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │                                      ┌─────────────┐       │
//! │                                      │ Classifier  │       │
//! │                                      │  (driver)   │       │
//! │                                      └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use face_capture_detector::{DetectorConfig, DetectorEvent, DriverRegistry};
//!
//! let registry = DriverRegistry::builtin();
//! let detector = registry
//!     .open("dahua", DetectorConfig::new("/srv/ftp/camera1"))
//!     .expect("Failed to start detector");
//!
//! while let Some(event) = detector.recv() {
//!     match event {
//!         DetectorEvent::FaceDetected(face) => {
//!             println!("face at {}: {} bytes", face.timestamp, face.face.len());
//!         }
//!         _ => continue,
//!     }
//! }
//!
//! println!("detector stopped: {:?}", detector.exit_status());
//! ```

pub mod classifier;
pub mod config;
pub mod core;
pub mod detector;
pub mod stats;
pub mod watcher;

// Re-export key types at crate root for convenience
pub use classifier::{
    Classifier, DahuaClassifier, DriverRegistry, FileClass, HikvisionClassifier,
    PredicateClassifier,
};
pub use config::{Config, ConfigError, DetectorConfig};
pub use core::{DetectorEvent, EventSummary, FaceDetected};
pub use detector::{Detector, DetectorError, DetectorExit, DetectorState};
pub use stats::{DetectorStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
