//! The client's download list (`downloads.config`).
//!
//! Every entry of the top-level `downloads` list is a dictionary describing
//! one download; the only fields the engine cares about are `torrent` (the
//! path of the torrent file, as raw bytes) and `torrent_hash` (its 20-byte
//! info-hash).

mod document;
pub mod error;
mod record;

pub use self::document::{DOWNLOADS_CONFIG, DOWNLOADS_KEY, HASH_KEY, TORRENT_KEY, downloads, load_document};
pub use self::record::{ExpectedRecord, expected_records};
