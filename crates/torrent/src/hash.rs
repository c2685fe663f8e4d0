use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use revive_bencode::raw_value;
use sha1::{Digest, Sha1};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Content identifier of a torrent: the SHA-1 digest of its bencoded `info`
/// dictionary.
///
/// Two torrent files with different names (or different trackers, comments,
/// creation dates...) describe the same content if and only if their info
/// hashes match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; InfoHash::LEN]);

impl InfoHash {
    pub const LEN: usize = 20;

    /// Wrap 20 raw bytes, as stored in the `torrent_hash` field of the
    /// client's download list.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = bytes.as_ref();
        let array = <[u8; Self::LEN]>::try_from(bytes)
            .or_raise(|| ErrorKind::InvalidHash(format!("{} bytes", bytes.len())))?;
        Ok(Self(array))
    }

    /// Digest the raw bytes of an `info` value.
    pub fn digest(info: impl AsRef<[u8]>) -> Self {
        let digest = Sha1::digest(info.as_ref());
        let mut out = [0u8; Self::LEN];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Lower-case hex, the canonical textual form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Upper-case hex, as used for the client's state file names.
    pub fn to_upper_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl Display for InfoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.to_hex())
    }
}

impl Debug for InfoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        let mut out = [0u8; Self::LEN];
        hex::decode_to_slice(s, &mut out).or_raise(|| ErrorKind::InvalidHash(s.to_string()))?;
        Ok(Self(out))
    }
}

/// Compute the [`InfoHash`] of a torrent file.
///
/// The digest is taken over the `info` value exactly as it appears in the
/// file. Re-encoding a decoded tree would only give the same answer for
/// canonically sorted files, and plenty of torrents in the wild aren't.
pub fn info_hash(torrent: impl AsRef<[u8]>) -> Result<InfoHash> {
    let raw = raw_value(torrent.as_ref(), "info")
        .or_raise(|| ErrorKind::Decode)?
        .ok_or_raise(|| ErrorKind::MissingField("info"))?;
    if raw.first() != Some(&b'd') {
        exn::bail!(ErrorKind::InvalidField("info"));
    }
    Ok(InfoHash::digest(raw))
}
