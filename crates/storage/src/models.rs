//! Storage models.

use std::path::PathBuf;
use time::OffsetDateTime;

/// What kind of directory entry a [`FileInfo`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// File metadata returned by storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Path in the same form the caller used to reach it (listing a
    /// directory yields `directory.join(name)`).
    pub path: PathBuf,
    pub kind: FileKind,
    /// File size in bytes (zero for directories)
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
    /// Last access timestamp, when the platform reports one
    pub accessed: Option<OffsetDateTime>,
    /// Creation (birth) timestamp, when the platform reports one
    pub created: Option<OffsetDateTime>,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self {
            path: path.into(),
            kind: FileKind::File,
            size,
            modified,
            accessed: None,
            created: None,
        }
    }

    pub fn directory(path: impl Into<PathBuf>, modified: OffsetDateTime) -> Self {
        Self {
            kind: FileKind::Directory,
            ..Self::new(path, 0, modified)
        }
    }

    pub fn with_accessed(mut self, accessed: impl Into<Option<OffsetDateTime>>) -> Self {
        self.accessed = accessed.into();
        self
    }

    pub fn with_created(mut self, created: impl Into<Option<OffsetDateTime>>) -> Self {
        self.created = created.into();
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Final path component as UTF-8, if it has one.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// The timestamp a copy of this file should be stamped with: its creation
    /// time where the platform records one, otherwise its modification time.
    pub fn birth_or_modified(&self) -> OffsetDateTime {
        self.created.unwrap_or(self.modified)
    }
}
