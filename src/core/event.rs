//! Detection events delivered to the consumer.

use crate::detector::DetectorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type name for [`FaceDetected`].
pub const FACE_DETECTED: &str = "FaceDetected";

/// A face capture, with the background snapshot when one arrived in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceDetected {
    /// Identifier for keying stored objects
    pub id: Uuid,
    /// When the face file settled
    pub timestamp: DateTime<Utc>,
    /// Face crop bytes, exactly as written by the camera
    pub face: Vec<u8>,
    /// Background snapshot bytes; `None` for a standalone face
    pub snapshot: Option<Vec<u8>>,
}

impl FaceDetected {
    pub fn new(timestamp: DateTime<Utc>, face: Vec<u8>, snapshot: Option<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            face,
            snapshot,
        }
    }

    /// True when no background file was paired with the face.
    pub fn is_standalone(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            id: self.id,
            event_type: FACE_DETECTED.to_string(),
            timestamp: self.timestamp,
            face_bytes: self.face.len(),
            snapshot_bytes: self.snapshot.as_ref().map(Vec::len),
        }
    }
}

/// Everything the detector can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DetectorEvent {
    FaceDetected(FaceDetected),
}

impl DetectorEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DetectorEvent::FaceDetected(_) => FACE_DETECTED,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DetectorEvent::FaceDetected(e) => e.timestamp,
        }
    }

    /// Take the face capture out of the event.
    ///
    /// Every current event is a face capture, so this only fails with
    /// [`DetectorError::UnexpectedEvent`] once further event kinds are added.
    /// Use [`DetectorEvent::as_face_detected`] to inspect without consuming.
    pub fn into_face_detected(self) -> Result<FaceDetected, DetectorError> {
        match self {
            DetectorEvent::FaceDetected(e) => Ok(e),
        }
    }

    pub fn as_face_detected(&self) -> Option<&FaceDetected> {
        match self {
            DetectorEvent::FaceDetected(e) => Some(e),
        }
    }
}

impl From<FaceDetected> for DetectorEvent {
    fn from(event: FaceDetected) -> Self {
        DetectorEvent::FaceDetected(event)
    }
}

/// Byte-free description of an event, for logs and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub face_bytes: usize,
    pub snapshot_bytes: Option<usize>,
}
