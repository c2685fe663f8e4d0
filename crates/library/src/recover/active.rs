//! Recovery from live state files.
//!
//! The client's per-download state document (`active/<HASH>.dat`) embeds the
//! complete torrent metadata next to its own bookkeeping. Stripping the
//! bookkeeping yields a torrent file that's exactly as current as the
//! download itself, without relying on any backup.

use crate::downloads::ExpectedRecord;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::recover::error::{ErrorKind, Result};
use crate::recover::{Mappings, RecoveredMapping, Recovery, candidates, file_name_of};
use crate::{Context, MAX_PROCESS_CONCURRENCY};
use exn::ResultExt;
use futures::{StreamExt, stream};
use revive_torrent::InfoHash;
use revive_torrent::state::state_file_name;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Rebuild every missing torrent that still has a state file, writing the
/// result to the recovery tree's torrents directory.
pub async fn recover(ctx: &Context, records: &[ExpectedRecord]) -> LibraryResult<Recovery> {
    recover_inner(ctx, records).await.or_raise(|| LibraryErrorKind::Recover)
}

#[instrument(skip_all, fields(active = %ctx.active_dir().display()))]
async fn recover_inner(ctx: &Context, records: &[ExpectedRecord]) -> Result<Recovery> {
    let mappings: Mappings = stream::iter(candidates(records))
        .map(|record| recover_record(ctx, record))
        .buffer_unordered(MAX_PROCESS_CONCURRENCY)
        .filter_map(|mapping| async move { mapping })
        .map(|mapping| (mapping.original.clone(), mapping))
        .collect()
        .await;
    let recovery = Recovery::new(records, mappings);
    info!(recovered = recovery.report.recovered, "State file extraction finished");
    Ok(recovery)
}

async fn recover_record(ctx: &Context, record: &ExpectedRecord) -> Option<RecoveredMapping> {
    let path = record.path.display();
    let Some(hash) = record.info_hash else {
        warn!(%path, reason = "download has no info-hash", "Unrecoverable torrent");
        return None;
    };
    let Some(file_name) = file_name_of(record) else {
        warn!(%path, %hash, reason = "path has no file name", "Unrecoverable torrent");
        return None;
    };
    let state = state_path(ctx, &hash);
    let destination = ctx.output_torrents_dir().join(&file_name);
    match extract(ctx, &state, &destination).await {
        Ok(true) => {
            debug!(%path, %hash, output = %destination.display(), "Rebuilt torrent from state file");
            Some(RecoveredMapping::new(record.raw_path.clone(), file_name, state))
        },
        Ok(false) => {
            warn!(%path, %hash, reason = "no state file", "Unrecoverable torrent");
            None
        },
        Err(e) => {
            warn!(%path, %hash, reason = %*e, error = ?e, "Unrecoverable torrent");
            None
        },
    }
}

/// Write the torrent embedded in `state` to `destination`, stamped with the
/// state file's creation time. Returns `false` if there's no state file.
async fn extract(ctx: &Context, state: &Path, destination: &Path) -> Result<bool> {
    let data = match ctx.sources.read(state).await {
        Ok(data) => data,
        Err(e) if e.is_not_found() => return Ok(false),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
    };
    let torrent = revive_torrent::torrent_from_state(&data).or_raise(|| ErrorKind::Torrent)?;
    ctx.output.write(destination, &torrent).await.or_raise(|| ErrorKind::Storage)?;

    match ctx.sources.stat(state).await {
        Ok(info) => {
            let stamp = info.birth_or_modified();
            if let Err(e) = ctx.output.set_times(destination, stamp, stamp).await {
                debug!(path = %destination.display(), error = ?e, "Could not set timestamps");
            }
        },
        Err(e) => debug!(path = %state.display(), error = ?e, "Could not read state file timestamps"),
    }
    Ok(true)
}

/// The state file the client keeps for a download.
pub fn state_path(ctx: &Context, hash: &InfoHash) -> PathBuf {
    ctx.active_dir().join(state_file_name(hash))
}
