//! Putting recovered torrents in place.
//!
//! The download list is never edited where it is. [`apply`] copies every
//! recovered torrent into the recovery tree and returns a re-encoded copy of
//! the list in which only the affected `torrent` fields point at the new
//! files; [`finalize`] also writes that copy to `downloads.config` in the
//! recovery tree. Moving the results over the client's own files is left to
//! the user.

pub mod error;
mod rewrite;
mod stage;

pub use self::rewrite::rewrite;
pub use self::stage::stage;

use crate::Context;
use crate::downloads::DOWNLOADS_CONFIG;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::patch::error::ErrorKind;
use crate::recover::Mappings;
use exn::ResultExt;
use revive_bencode::{Value, encode};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Counts from [`finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Torrent files copied into the recovery tree.
    pub staged: usize,
    /// Download list entries pointed at a recovered file.
    pub rewritten: usize,
    /// The patched download list, relative to the recovery tree.
    pub output: PathBuf,
}

/// Stage the recovered files, then rewrite and encode the download list.
///
/// Mappings that fail to stage get their `error` set and are left out of the
/// rewrite. Returns the encoded document with the number of files staged and
/// entries rewritten.
pub async fn apply(ctx: &Context, mut document: Value, mappings: &mut Mappings) -> (Vec<u8>, usize, usize) {
    let staged = stage(ctx, mappings).await;
    let rewritten = rewrite(&mut document, mappings, &ctx.data_torrents_dir());
    (encode(&document), staged, rewritten)
}

/// [`apply`], then write the result to `downloads.config` in the recovery
/// tree.
#[instrument(skip_all, fields(mappings = mappings.len()))]
pub async fn finalize(ctx: &Context, document: Value, mappings: &mut Mappings) -> LibraryResult<PatchOutcome> {
    let (encoded, staged, rewritten) = apply(ctx, document, mappings).await;
    let output = Path::new(DOWNLOADS_CONFIG).to_path_buf();
    ctx.output
        .write(&output, &encoded)
        .await
        .or_raise(|| ErrorKind::Storage)
        .or_raise(|| LibraryErrorKind::Patch)?;
    info!(staged, rewritten, bytes = encoded.len(), output = %output.display(), "Wrote patched download list");
    Ok(PatchOutcome { staged, rewritten, output })
}
