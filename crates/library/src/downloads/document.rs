use crate::Context;
use crate::downloads::error::{ErrorKind, Result};
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use exn::{OptionExt, ResultExt};
use revive_bencode::{Dict, Value, decode};
use tracing::{info, instrument};

/// File name of the download list inside the client's data directory.
pub const DOWNLOADS_CONFIG: &str = "downloads.config";
/// Top-level key holding the list of downloads.
pub const DOWNLOADS_KEY: &str = "downloads";
/// Per-download key holding the torrent file path.
pub const TORRENT_KEY: &str = "torrent";
/// Per-download key holding the raw info-hash.
pub const HASH_KEY: &str = "torrent_hash";

/// Read and decode the download list named by the context.
///
/// This is the one failure that aborts a recovery run.
pub async fn load_document(ctx: &Context) -> LibraryResult<Value> {
    load_document_inner(ctx).await.or_raise(|| LibraryErrorKind::Downloads)
}

#[instrument(skip_all, fields(path = %ctx.downloads_config.display()))]
async fn load_document_inner(ctx: &Context) -> Result<Value> {
    let data = ctx.sources.read(&ctx.downloads_config).await.or_raise(|| ErrorKind::Storage)?;
    let document = decode(&data).or_raise(|| ErrorKind::Decode)?;
    let count = document
        .as_dict()
        .and_then(|dict| dict.get(DOWNLOADS_KEY))
        .and_then(Value::as_list)
        .ok_or_raise(|| ErrorKind::MissingList)?
        .len();
    info!(bytes = data.len(), downloads = count, "Loaded download list");
    Ok(document)
}

/// The dictionaries of the top-level `downloads` list. Anything in the list
/// that isn't a dictionary is skipped.
pub fn downloads(document: &Value) -> impl Iterator<Item = &Dict> {
    document
        .as_dict()
        .and_then(|dict| dict.get(DOWNLOADS_KEY))
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use revive_storage::backend::MockBackend;
    use rstest::rstest;
    use std::sync::Arc;

    fn context(config: &'static [u8]) -> Context {
        let sources = Arc::new(MockBackend::with_files([("/data/downloads.config", config)]));
        Context::new(sources, Arc::new(MockBackend::default()), "/data")
    }

    #[tokio::test]
    async fn test_load_document() {
        let ctx = context(b"d9:downloadsld7:torrent15:/data/x.torrentei5eee");
        let document = load_document(&ctx).await.unwrap();
        let entries: Vec<_> = downloads(&document).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get(TORRENT_KEY).and_then(Value::as_bytes), Some(&b"/data/x.torrent"[..]));
    }

    #[rstest]
    #[case::corrupt(b"d9:downloadsl")]
    #[case::no_list(b"d5:otheri1ee")]
    #[case::list_is_not_a_list(b"d9:downloadsi1ee")]
    #[case::not_a_dict(b"le")]
    #[tokio::test]
    async fn test_load_document_fatal(#[case] config: &'static [u8]) {
        let err = load_document(&context(config)).await.unwrap_err();
        assert_eq!(*err, LibraryErrorKind::Downloads);
    }

    #[tokio::test]
    async fn test_load_document_missing_file() {
        let ctx = Context::new(Arc::new(MockBackend::default()), Arc::new(MockBackend::default()), "/data");
        assert!(load_document(&ctx).await.is_err());
    }
}
