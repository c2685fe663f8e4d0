//! Torrent metadata: identity, client file conventions and reconstruction.
//!
//! - [`info_hash`] computes the [`InfoHash`] content identifier of a torrent.
//! - [`state`] knows how the client names its per-download state files.
//! - [`torrent_from_state`] rebuilds a standalone `.torrent` from a state file.

pub mod error;
mod hash;
pub mod state;
mod standalone;

pub use crate::hash::{InfoHash, info_hash};
pub use crate::standalone::{TORRENT_KEYS, standalone_torrent, torrent_from_state};
pub use revive_bencode::is_valid;
use std::path::Path;

/// Extension of torrent files, without the dot.
pub const TORRENT_EXTENSION: &str = "torrent";

/// Directory (relative to the client's data directory, and to every backup
/// snapshot) holding torrent files.
pub const DEFAULT_TORRENTS_DIRECTORY: &str = "torrents";

/// Check if a path looks like a torrent file.
pub fn is_torrent_path(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(TORRENT_EXTENSION))
}
