//! Matching strategies.
//!
//! Each strategy takes the [`ExpectedRecord`]s of a download list, looks only
//! at the [missing](ExpectedRecord::is_missing) ones, and produces a
//! [`Recovery`]: a [`RecoveredMapping`] for every torrent it found a
//! replacement for, keyed by the record's original `torrent` bytes.
//!
//! - [`filename`] searches backups for a file with the same name.
//! - [`hash`] looks the info-hash up in a [`ContentIndex`](revive_cache::ContentIndex).
//! - [`active`] rebuilds the torrent from the client's live state file.
//!
//! Healthy records never produce a mapping.

pub mod active;
pub mod error;
pub mod filename;
pub mod hash;

use crate::downloads::ExpectedRecord;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// A replacement for one missing torrent file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredMapping {
    /// The `torrent` field of the download list entry, as stored.
    pub original: Vec<u8>,
    /// Name the recovered file is stored under in the torrents directory.
    pub file_name: OsString,
    /// Where the replacement was found.
    pub source: PathBuf,
    /// Set when the replacement couldn't be put in place; such a mapping is
    /// never applied to the download list.
    pub error: Option<String>,
}

impl RecoveredMapping {
    pub fn new(original: impl Into<Vec<u8>>, file_name: impl Into<OsString>, source: impl Into<PathBuf>) -> Self {
        Self {
            original: original.into(),
            file_name: file_name.into(),
            source: source.into(),
            error: None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        self.error.is_none()
    }
}

/// Mappings keyed by original path bytes.
pub type Mappings = BTreeMap<Vec<u8>, RecoveredMapping>;

/// Final counts of a recovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Entries in the download list.
    pub total: usize,
    /// Entries whose torrent was already present and valid.
    pub valid: usize,
    pub recovered: usize,
    pub unrecoverable: usize,
}

impl RecoveryReport {
    /// Count records against the mappings that can still be applied.
    pub fn tally(records: &[ExpectedRecord], mappings: &Mappings) -> Self {
        let total = records.len();
        let valid = records.iter().filter(|r| !r.is_missing()).count();
        let recovered = records
            .iter()
            .filter(|r| r.is_missing())
            .filter(|r| mappings.get(&r.raw_path).is_some_and(RecoveredMapping::is_applicable))
            .count();
        Self {
            total,
            valid,
            recovered,
            unrecoverable: total - valid - recovered,
        }
    }
}

impl Display for RecoveryReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "total: {}, valid: {}, recovered: {}, unrecoverable: {}",
            self.total, self.valid, self.recovered, self.unrecoverable
        )
    }
}

/// Outcome of a matching strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recovery {
    pub mappings: Mappings,
    pub report: RecoveryReport,
}

impl Recovery {
    pub(crate) fn new(records: &[ExpectedRecord], mappings: Mappings) -> Self {
        let report = RecoveryReport::tally(records, &mappings);
        Self { mappings, report }
    }
}

/// The records a strategy should try to recover.
pub(crate) fn candidates(records: &[ExpectedRecord]) -> impl Iterator<Item = &ExpectedRecord> {
    records.iter().filter(|record| record.is_missing() && record.has_path())
}

/// The recovered file keeps the base name the download list used.
pub(crate) fn file_name_of(record: &ExpectedRecord) -> Option<OsString> {
    record.path.file_name().map(|name| name.to_os_string())
}
