//! Built-in vendor naming conventions.

use super::{is_tagged_jpeg, Classifier};
use std::path::Path;

/// Dahua cameras tag the face crop with `[M]` and the background with `[R]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DahuaClassifier;

impl Classifier for DahuaClassifier {
    fn is_face_file(&self, path: &Path) -> bool {
        is_tagged_jpeg(path, "[M]")
    }

    fn is_background_file(&self, path: &Path) -> bool {
        is_tagged_jpeg(path, "[R]")
    }
}

/// Hikvision cameras use `FACE_SNAP` and `FACE_BACKGROUND` in the file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct HikvisionClassifier;

impl Classifier for HikvisionClassifier {
    fn is_face_file(&self, path: &Path) -> bool {
        is_tagged_jpeg(path, "FACE_SNAP")
    }

    fn is_background_file(&self, path: &Path) -> bool {
        is_tagged_jpeg(path, "FACE_BACKGROUND")
    }
}
