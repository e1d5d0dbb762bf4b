//! Raw file activity reported by the watcher.

use notify::event::{EventKind, ModifyKind, RenameMode};
use std::path::PathBuf;

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFileKind {
    /// The file appeared in the directory (created or moved in)
    Created,
    /// Data was written to the file
    Modified,
}

/// A single raw notification for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileEvent {
    pub path: PathBuf,
    pub kind: RawFileKind,
}

impl RawFileEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RawFileKind::Created,
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RawFileKind::Modified,
        }
    }

    /// Convert a notify event into zero or more raw events.
    ///
    /// Only creation and data writes matter. A rename into the directory counts
    /// as creation since cameras uploading over FTP often write to a temporary
    /// name first. Removals, metadata changes and access events are dropped.
    pub fn from_notify(event: &notify::Event) -> Vec<Self> {
        let kind = match event.kind {
            EventKind::Create(_) => RawFileKind::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => RawFileKind::Created,
            EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Other) => RawFileKind::Modified,
            _ => return Vec::new(),
        };

        event
            .paths
            .iter()
            .map(|path| Self {
                path: path.clone(),
                kind,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    fn make_event(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut event = notify::Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_create_and_write() {
        let created = make_event(EventKind::Create(CreateKind::File), &["/d/a[M].jpg"]);
        assert_eq!(
            RawFileEvent::from_notify(&created),
            vec![RawFileEvent::created("/d/a[M].jpg")]
        );

        let written = make_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/d/a[M].jpg"],
        );
        assert_eq!(
            RawFileEvent::from_notify(&written),
            vec![RawFileEvent::modified("/d/a[M].jpg")]
        );
    }

    #[test]
    fn test_rename_into_directory_counts_as_created() {
        let moved = make_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/d/b[R].jpg"],
        );
        assert_eq!(
            RawFileEvent::from_notify(&moved),
            vec![RawFileEvent::created("/d/b[R].jpg")]
        );
    }

    #[test]
    fn test_irrelevant_kinds_are_dropped() {
        let kinds = [
            EventKind::Remove(RemoveKind::File),
            EventKind::Access(AccessKind::Any),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
        ];
        for kind in kinds {
            assert!(RawFileEvent::from_notify(&make_event(kind, &["/d/x.jpg"])).is_empty());
        }
    }
}
