//! Recovery by content.
//!
//! Backups accumulate many stale copies of the same torrent, often under
//! different names. Looking the download's info-hash up in the
//! [`ContentIndex`] finds all of them; the most recently modified copy is
//! taken as the one least likely to be damaged itself.

use crate::downloads::ExpectedRecord;
use crate::recover::{Mappings, RecoveredMapping, Recovery, candidates, file_name_of};
use revive_cache::ContentIndex;
use tracing::{debug, info, instrument, warn};

/// Map every missing record to the freshest backup copy with the same
/// info-hash.
#[instrument(skip_all, fields(hashes = index.stats().unique_hashes))]
pub fn recover(records: &[ExpectedRecord], index: &ContentIndex) -> Recovery {
    let mut mappings = Mappings::new();
    for record in candidates(records) {
        let path = record.path.display();
        let Some(hash) = record.info_hash else {
            warn!(%path, reason = "download has no info-hash", "Unrecoverable torrent");
            continue;
        };
        let Some(entry) = index.freshest(&hash) else {
            warn!(%path, %hash, reason = "no backup with this info-hash", "Unrecoverable torrent");
            continue;
        };
        let Some(file_name) = file_name_of(record) else {
            warn!(%path, %hash, reason = "path has no file name", "Unrecoverable torrent");
            continue;
        };
        debug!(%path, %hash, source = %entry.path.display(), copies = index.get(&hash).len(), "Found backup copy");
        mappings.insert(record.raw_path.clone(), RecoveredMapping::new(record.raw_path.clone(), file_name, &entry.path));
    }
    let recovery = Recovery::new(records, mappings);
    info!(recovered = recovery.report.recovered, "Content lookup finished");
    recovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recover::fixtures::{healthy, missing, record};
    use revive_cache::BackupEntry;
    use revive_torrent::InfoHash;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use time::macros::datetime;

    fn index(entries: Vec<(InfoHash, BackupEntry)>) -> ContentIndex {
        let mut found: HashMap<InfoHash, Vec<BackupEntry>> = HashMap::new();
        for (hash, entry) in entries {
            found.entry(hash).or_default().push(entry);
        }
        let mut index = ContentIndex::new();
        index.merge([PathBuf::from("/b1"), PathBuf::from("/b2")], found, datetime!(2024-01-01 00:00 UTC));
        index
    }

    #[test]
    fn test_freshest_copy_wins() {
        let hash = InfoHash::digest(b"d4:name1:xe");
        let index = index(vec![
            (hash, BackupEntry::new("/b2/torrents/renamed.torrent", datetime!(2023-06-01 00:00 UTC))),
            (hash, BackupEntry::new("/b1/torrents/x.torrent", datetime!(2023-01-01 00:00 UTC))),
        ]);
        let records = vec![missing("/data/x.torrent", Some(hash))];
        let recovery = recover(&records, &index);
        let mapping = &recovery.mappings[&b"/data/x.torrent".to_vec()];
        assert_eq!(mapping.source, PathBuf::from("/b2/torrents/renamed.torrent"));
        assert_eq!(mapping.file_name, "x.torrent");
        assert_eq!(recovery.report.recovered, 1);
    }

    #[test]
    fn test_misses_are_unrecoverable() {
        let known = InfoHash::digest(b"known");
        let index = index(vec![(known, BackupEntry::new("/b1/torrents/k.torrent", datetime!(2023-01-01 00:00 UTC)))]);
        let records = vec![
            missing("/data/no-hash.torrent", None),
            missing("/data/unknown.torrent", Some(InfoHash::digest(b"unknown"))),
            healthy("/data/k.torrent", Some(known)),
            // Known hash, but no torrent path to restore it under.
            record("", Some(known), false, false),
        ];
        let recovery = recover(&records, &index);
        assert!(recovery.mappings.is_empty());
        assert_eq!(recovery.report.total, 4);
        assert_eq!(recovery.report.unrecoverable, 3);
        assert_eq!(recovery.report.valid, 1);
    }
}
