//! Core functionality for the face capture detector.
//!
//! This module contains:
//! - The correlator that pairs face files with background files
//! - The detection event types handed to consumers

pub mod correlator;
pub mod event;

// Re-export commonly used types
pub use correlator::{Correlator, Settled};
pub use event::{DetectorEvent, EventSummary, FaceDetected, FACE_DETECTED};
