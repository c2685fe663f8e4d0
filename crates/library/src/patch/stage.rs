use crate::Context;
use crate::patch::error::{ErrorKind, Result};
use crate::recover::{Mappings, RecoveredMapping};
use exn::ResultExt;
use std::path::Path;
use tracing::{debug, warn};

/// Copy every applicable mapping's source into the recovery tree's torrents
/// directory.
///
/// Nothing is copied when the file is already in the recovery tree or in the
/// client's own torrents directory, so running twice doesn't copy twice. A
/// mapping that can't be staged has its `error` set. Returns the number of
/// files copied.
pub async fn stage(ctx: &Context, mappings: &mut Mappings) -> usize {
    let mut staged = 0;
    for mapping in mappings.values_mut().filter(|mapping| mapping.is_applicable()) {
        match stage_one(ctx, mapping).await {
            Ok(true) => staged += 1,
            Ok(false) => {},
            Err(e) => {
                warn!(source = %mapping.source.display(), reason = %*e, error = ?e, "Could not stage recovered torrent");
                mapping.error = Some((*e).to_string());
            },
        }
    }
    staged
}

async fn stage_one(ctx: &Context, mapping: &RecoveredMapping) -> Result<bool> {
    let destination = ctx.output_torrents_dir().join(&mapping.file_name);
    if ctx.output.exists(&destination).await.or_raise(|| ErrorKind::Storage)? {
        debug!(path = %destination.display(), "Already staged");
        return Ok(false);
    }
    let live = ctx.data_torrents_dir().join(&mapping.file_name);
    if ctx.sources.exists(&live).await.or_raise(|| ErrorKind::Storage)? {
        debug!(path = %live.display(), "Already in the torrents directory");
        return Ok(false);
    }
    if !ctx.sources.exists(&mapping.source).await.or_raise(|| ErrorKind::Storage)? {
        exn::bail!(ErrorKind::SourceMissing);
    }
    copy(ctx, &mapping.source, &destination).await?;
    Ok(true)
}

async fn copy(ctx: &Context, source: &Path, destination: &Path) -> Result<()> {
    ctx.copy_out(source, destination).await.or_raise(|| ErrorKind::Storage)
}
