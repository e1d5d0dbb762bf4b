//! File classification for camera drop directories.
//!
//! Each camera vendor names its face crops and background snapshots
//! differently. A [`Classifier`] captures one naming convention so the rest of
//! the detector can stay vendor-agnostic.

pub mod registry;
pub mod vendors;

pub use registry::{ClassifierFactory, DriverRegistry};
pub use vendors::{DahuaClassifier, HikvisionClassifier};

use std::fmt;
use std::path::Path;

/// Role of a settled file within a capture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Cropped face image, first half of a pair
    FaceFile,
    /// Full-scene image, second half of a pair
    BackgroundFile,
    /// Anything else dropped into the directory
    Irrelevant,
}

/// Vendor-specific naming rules.
///
/// Implementations must be pure and must not report a path as both a face
/// file and a background file.
pub trait Classifier: Send + Sync {
    fn is_face_file(&self, path: &Path) -> bool;

    fn is_background_file(&self, path: &Path) -> bool;

    fn classify(&self, path: &Path) -> FileClass {
        if self.is_face_file(path) {
            FileClass::FaceFile
        } else if self.is_background_file(path) {
            FileClass::BackgroundFile
        } else {
            FileClass::Irrelevant
        }
    }
}

type PathPredicate = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// A classifier assembled from two closures.
pub struct PredicateClassifier {
    face: PathPredicate,
    background: PathPredicate,
}

impl PredicateClassifier {
    pub fn new<F, B>(face: F, background: B) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
        B: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        Self {
            face: Box::new(face),
            background: Box::new(background),
        }
    }
}

impl Classifier for PredicateClassifier {
    fn is_face_file(&self, path: &Path) -> bool {
        (self.face)(path)
    }

    fn is_background_file(&self, path: &Path) -> bool {
        (self.background)(path)
    }
}

impl fmt::Debug for PredicateClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateClassifier").finish_non_exhaustive()
    }
}

/// True when `path` has a `.jpg` extension and its file name contains `marker`.
pub(crate) fn is_tagged_jpeg(path: &Path, marker: &str) -> bool {
    let is_jpeg = path.extension().map(|e| e == "jpg").unwrap_or(false);
    is_jpeg
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.contains(marker))
            .unwrap_or(false)
}
