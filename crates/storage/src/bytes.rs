//! Paths as raw bytes.
//!
//! The client stores paths as byte strings in whatever encoding the platform
//! used, and the index database keeps them the same way, so a file name that
//! isn't valid UTF-8 still round-trips.

use std::path::{Path, PathBuf};

/// Interpret a raw byte string as a path.
#[cfg(unix)]
pub fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

/// Interpret a raw byte string as a path.
///
/// Non-UTF-8 sequences are replaced: they can't be represented losslessly
/// off Unix.
#[cfg(not(unix))]
pub fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// The raw bytes of a path.
#[cfg(unix)]
pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

/// The raw bytes of a path.
#[cfg(not(unix))]
pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_bytes() {
        let path = path_from_bytes(b"/data/torrents/x.torrent");
        assert_eq!(path, PathBuf::from("/data/torrents/x.torrent"));
        assert_eq!(path_to_bytes(&path), b"/data/torrents/x.torrent".to_vec());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_survives() {
        let raw = b"/data/caf\xe9.torrent";
        assert_eq!(path_to_bytes(&path_from_bytes(raw)), raw.to_vec());
    }
}
