use crate::downloads::document::{HASH_KEY, TORRENT_KEY, downloads};
use crate::{Context, MAX_PROCESS_CONCURRENCY, path_from_bytes};
use futures::{StreamExt, stream};
use revive_bencode::Value;
use revive_torrent::{InfoHash, is_valid};
use std::path::PathBuf;
use tracing::{debug, instrument, warn};

/// The state of one torrent file referenced by the download list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedRecord {
    /// The `torrent` field exactly as stored, used as the mapping key when
    /// the document is patched. Empty when the entry has no torrent path.
    pub raw_path: Vec<u8>,
    pub path: PathBuf,
    /// `None` when the entry has no (well-formed) `torrent_hash`.
    pub info_hash: Option<InfoHash>,
    pub exists: bool,
    /// The file decodes. Always `false` when it doesn't exist.
    pub valid: bool,
}

impl ExpectedRecord {
    /// Missing records are the ones recovery strategies work on: absent from
    /// disk, or present but corrupt.
    pub fn is_missing(&self) -> bool {
        !(self.exists && self.valid)
    }

    /// An entry without a torrent path is counted but can't be recovered:
    /// there's no file name to search for and nothing to patch.
    pub fn has_path(&self) -> bool {
        !self.raw_path.is_empty()
    }
}

/// Check every torrent file referenced by the download list.
///
/// Every entry yields a record, including those without a `torrent` path
/// (which are always missing). A file that exists but can't be read counts
/// as invalid. Records come back in document order.
#[instrument(skip_all)]
pub async fn expected_records(ctx: &Context, document: &Value) -> Vec<ExpectedRecord> {
    let entries: Vec<(Vec<u8>, Option<InfoHash>)> = downloads(document)
        .map(|entry| {
            let raw_path = entry.get(TORRENT_KEY).and_then(Value::as_bytes).unwrap_or_default();
            let info_hash =
                entry.get(HASH_KEY).and_then(Value::as_bytes).and_then(|bytes| InfoHash::from_bytes(bytes).ok());
            (raw_path.to_vec(), info_hash)
        })
        .collect();

    let records: Vec<ExpectedRecord> = stream::iter(entries)
        .map(|(raw_path, info_hash)| check(ctx, raw_path, info_hash))
        .buffered(MAX_PROCESS_CONCURRENCY)
        .collect()
        .await;
    debug!(
        records = records.len(),
        missing = records.iter().filter(|r| r.is_missing()).count(),
        "Checked download list"
    );
    records
}

async fn check(ctx: &Context, raw_path: Vec<u8>, info_hash: Option<InfoHash>) -> ExpectedRecord {
    let path = path_from_bytes(&raw_path);
    if raw_path.is_empty() {
        warn!(hash = ?info_hash, "Download has no torrent path");
        return ExpectedRecord { raw_path, path, info_hash, exists: false, valid: false };
    }
    let exists = match ctx.sources.exists(&path).await {
        Ok(exists) => exists,
        Err(e) => {
            warn!(path = %path.display(), error = ?e, "Could not check torrent file");
            false
        },
    };
    let valid = exists
        && match ctx.sources.read(&path).await {
            Ok(data) => is_valid(&data),
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "Could not read torrent file");
                false
            },
        };
    ExpectedRecord { raw_path, path, info_hash, exists, valid }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revive_bencode::decode;
    use revive_storage::backend::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_expected_records() {
        let hash = InfoHash::digest(b"de");
        let mut config = b"d9:downloadsl".to_vec();
        config.extend_from_slice(b"d7:torrent15:/data/a.torrente");
        config.extend_from_slice(b"d7:torrent15:/data/b.torrent12:torrent_hash20:");
        config.extend_from_slice(hash.as_bytes());
        config.extend_from_slice(b"e");
        config.extend_from_slice(b"d7:torrent15:/data/c.torrent12:torrent_hash3:abce");
        config.extend_from_slice(b"d8:categoryi1ee");
        config.extend_from_slice(b"d7:torrent0:e");
        config.extend_from_slice(b"ee");
        let document = decode(&config).unwrap();

        let sources = Arc::new(MockBackend::with_files([
            ("/data/a.torrent", &b"d4:infodee"[..]),
            ("/data/b.torrent", &b"d4:info"[..]),
        ]));
        let ctx = Context::new(sources, Arc::new(MockBackend::default()), "/data");
        let records = expected_records(&ctx, &document).await;

        assert_eq!(records.len(), 5);
        let a = &records[0];
        assert_eq!((a.exists, a.valid, a.is_missing(), a.info_hash), (true, true, false, None));
        let b = &records[1];
        assert_eq!(b.raw_path, b"/data/b.torrent".to_vec());
        assert_eq!((b.exists, b.valid, b.is_missing(), b.info_hash), (true, false, true, Some(hash)));
        let c = &records[2];
        assert_eq!(c.path, PathBuf::from("/data/c.torrent"));
        assert_eq!((c.exists, c.valid, c.is_missing(), c.info_hash), (false, false, true, None));
        for pathless in &records[3..] {
            assert!(pathless.raw_path.is_empty());
            assert!(pathless.is_missing());
            assert!(!pathless.has_path());
        }
        assert!(records[..3].iter().all(ExpectedRecord::has_path));
    }
}
