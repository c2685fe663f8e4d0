use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use revive_bencode::{Dict, Value, decode, encode};

/// Top-level keys that make up a standalone torrent file, in canonical order.
///
/// State documents carry these alongside the client's own bookkeeping
/// (peers, piece maps, statistics...) which has no place in a torrent.
pub const TORRENT_KEYS: [&str; 7] =
    ["announce", "announce-list", "comment", "created by", "creation date", "encoding", "info"];

/// Build a minimal torrent document out of a decoded state document.
///
/// Only [`TORRENT_KEYS`] are copied (first occurrence wins), producing a
/// canonically sorted dictionary. The `info` dictionary is copied as decoded,
/// so its bytes (and therefore the info-hash) are unchanged.
pub fn standalone_torrent(state: &Value) -> Result<Value> {
    let state = state.as_dict().ok_or_raise(|| ErrorKind::InvalidField("state document"))?;
    if !state.get("info").is_some_and(|info| info.as_dict().is_some()) {
        exn::bail!(ErrorKind::MissingField("info"));
    }
    let mut torrent = Dict::new();
    for key in TORRENT_KEYS {
        if let Some(value) = state.get(key) {
            torrent.insert(key, value.clone());
        }
    }
    Ok(Value::Dict(torrent))
}

/// Decode a raw state file and re-encode its torrent subset.
pub fn torrent_from_state(state: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    let state = decode(state).or_raise(|| ErrorKind::Decode)?;
    Ok(encode(&standalone_torrent(&state)?))
}
