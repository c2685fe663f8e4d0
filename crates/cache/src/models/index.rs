use revive_torrent::InfoHash;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// One on-disk copy of a torrent file found in a backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub modified: OffsetDateTime,
}
impl BackupEntry {
    pub fn new(path: impl Into<PathBuf>, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), modified }
    }

    /// Most recent first; equal timestamps fall back to path order so the
    /// result never depends on scan order.
    fn freshest_first(a: &Self, b: &Self) -> Ordering {
        b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path))
    }
}

/// Summary of an index, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub built_at: Option<OffsetDateTime>,
    pub directories: usize,
    pub unique_hashes: usize,
    pub entries: usize,
}

/// Content-addressed index of backup torrent files.
///
/// Maps every [`InfoHash`] seen while scanning backup directories to the
/// copies of that torrent, freshest first. The set of scanned directories is
/// recorded too, so a later build only has to look at directories that were
/// added since.
///
/// Fields are private: an index is either empty, loaded from the cache, or
/// grown by [`merge`](Self::merge). There is no way to remove anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentIndex {
    directories: Vec<PathBuf>,
    entries: HashMap<InfoHash, Vec<BackupEntry>>,
    built_at: Option<OffsetDateTime>,
}

impl ContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble a persisted index.
    pub(crate) fn from_parts(
        directories: Vec<PathBuf>,
        entries: impl IntoIterator<Item = (InfoHash, BackupEntry)>,
        built_at: OffsetDateTime,
    ) -> Self {
        let mut index = Self::new();
        let mut grouped: HashMap<InfoHash, Vec<BackupEntry>> = HashMap::new();
        for (hash, entry) in entries {
            grouped.entry(hash).or_default().push(entry);
        }
        index.merge(directories, grouped, built_at);
        index
    }

    /// Directories that have been scanned, in the order they were first
    /// scanned.
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn built_at(&self) -> Option<OffsetDateTime> {
        self.built_at
    }

    pub fn covers(&self, directory: impl AsRef<Path>) -> bool {
        let directory = directory.as_ref();
        self.directories.iter().any(|d| d == directory)
    }

    /// The requested directories that haven't been scanned yet, without
    /// duplicates and in request order.
    pub fn missing<'a>(&self, requested: &'a [PathBuf]) -> Vec<&'a PathBuf> {
        let mut seen = HashSet::new();
        requested.iter().filter(|dir| !self.covers(dir) && seen.insert(dir.as_path())).collect()
    }

    /// Every known copy of a torrent, freshest first.
    pub fn get(&self, hash: &InfoHash) -> &[BackupEntry] {
        self.entries.get(hash).map(Vec::as_slice).unwrap_or_default()
    }

    /// The most recently modified copy of a torrent.
    pub fn freshest(&self, hash: &InfoHash) -> Option<&BackupEntry> {
        self.get(hash).first()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InfoHash, &[BackupEntry])> {
        self.entries.iter().map(|(hash, entries)| (hash, entries.as_slice()))
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            built_at: self.built_at,
            directories: self.directories.len(),
            unique_hashes: self.entries.len(),
            entries: self.entries.values().map(Vec::len).sum(),
        }
    }

    /// Fold the results of a scan into the index.
    ///
    /// Scanned directories are appended (duplicates are dropped), found
    /// entries are appended to their hash's list and every list is then
    /// sorted once.
    pub fn merge(
        &mut self,
        scanned: impl IntoIterator<Item = PathBuf>,
        found: HashMap<InfoHash, Vec<BackupEntry>>,
        built_at: OffsetDateTime,
    ) {
        for directory in scanned {
            if !self.covers(&directory) {
                self.directories.push(directory);
            }
        }
        for (hash, entries) in found {
            self.entries.entry(hash).or_default().extend(entries);
        }
        for entries in self.entries.values_mut() {
            entries.sort_by(BackupEntry::freshest_first);
        }
        self.built_at = Some(built_at);
    }
}
