//! Normalising paths handed to a backend.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Normalise a backend path and make sure it stays inside the backend root.
///
/// A leading `/` is dropped rather than rejected: the source backend is
/// rooted at `/`, and `downloads.config` stores absolute paths. `.` segments
/// and repeated slashes disappear, `..` pops a segment, and popping past the
/// root is an [`InvalidPath`](ErrorKind::InvalidPath). So are empty results,
/// Windows prefixes and NUL bytes (which the OS would silently truncate at).
/// Backends strip their own root (drive included) before calling this.
///
/// ```
/// use std::path::Path;
/// use revive_storage::validate_path;
///
/// assert_eq!(
///     validate_path("/backups/2024-01-01/./torrents//x.torrent").unwrap(),
///     Path::new("backups/2024-01-01/torrents/x.torrent")
/// );
/// assert!(validate_path("active/../downloads.config").is_ok());
/// assert!(validate_path("torrents/../../etc/passwd").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || exn::Exn::from(ErrorKind::InvalidPath(path.to_path_buf()));
    let mut normalised = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) if segment.as_encoded_bytes().contains(&0) => return Err(invalid()),
            Component::Normal(segment) => normalised.push(segment),
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir => {
                if !normalised.pop() {
                    return Err(invalid());
                }
            },
            Component::Prefix(_) => return Err(invalid()),
        }
    }
    if normalised.as_os_str().is_empty() {
        return Err(invalid());
    }
    Ok(normalised)
}
