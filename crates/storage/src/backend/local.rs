//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local filesystem.
//! Files are stored in a configured directory and accessed using standard filesystem
//! operations via `tokio::fs` for async I/O.

use crate::backend::FileInfoStream;
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{FileTimes, Metadata, OpenOptions, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use time::OffsetDateTime;
use tokio::fs::{self, DirEntry};

/// Local filesystem storage backend.
///
/// All paths are relative to the configured root directory. Rooting a
/// backend at `/` gives access to arbitrary absolute paths, which is how the
/// client's data and backup directories are read.
///
/// # Examples
///
/// ```no_run
/// use revive_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let recovery = LocalBackend::new("recovery", "/home/me/.azureus-recover")?;
/// let sources = LocalBackend::open("sources", "/")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating the root directory if
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = Self::absolute_root(root)?;
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Open a backend over a directory that must already exist.
    pub fn open(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = Self::absolute_root(root)?;
        if !root.is_dir() {
            exn::bail!(ErrorKind::NotFound(root));
        }
        Ok(Self { name: name.into(), root })
    }

    fn absolute_root(root: impl AsRef<Path>) -> Result<PathBuf> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(root)
    }

    /// Get the absolute path for a storage path.
    ///
    /// A path that already lies under the root (including its drive prefix
    /// on Windows, `C:\vuze\downloads.config` for a backend rooted at `C:\`)
    /// has the root stripped first. Whatever remains is validated and joined
    /// with the root directory.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let validated = validate_path(relative)?;
        Ok(self.root.join(validated))
    }

    /// Re-use same data collection from file metadata for both list and stat functions
    fn metadata(path: &Path, metadata: &Metadata) -> Result<FileInfo> {
        let modified: OffsetDateTime = metadata.modified().map_err(ErrorKind::Io)?.into();
        let info = if metadata.is_dir() {
            FileInfo::directory(path, modified)
        } else {
            FileInfo::new(path, metadata.len(), modified)
        };
        Ok(info
            .with_accessed(metadata.accessed().ok().map(OffsetDateTime::from))
            .with_created(metadata.created().ok().map(OffsetDateTime::from)))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Turn a directory entry into listing metadata. Broken symlinks, sockets
    /// and the like come back as `None`.
    async fn process_entry(&self, entry: DirEntry, dir: &Path) -> Result<Option<FileInfo>> {
        let listed = dir.join(entry.file_name());
        // Follow symlinks: backup snapshots are often linked in from elsewhere.
        let metadata = match fs::metadata(entry.path()).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => exn::bail!(Self::map_io_error(e, &listed)),
        };
        if !metadata.is_file() && !metadata.is_dir() {
            return Ok(None);
        }
        Self::metadata(&listed, &metadata).map(Some)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, dir: &'a Path) -> FileInfoStream<'a> {
        let absolute = match self.absolute_path(dir) {
            Ok(absolute) => absolute,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };

        Box::pin(stream! {
            let mut entries = match fs::read_dir(&absolute).await {
                Ok(entries) => entries,
                // Asking for the contents of a directory that doesn't exist
                // results in an empty list not an error.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
                Err(err) => {
                    yield Err(exn::Exn::from(Self::map_io_error(err, dir)));
                    return;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, dir))); continue; },
                };
                match self.process_entry(entry, dir).await {
                    Ok(Some(info)) => yield Ok(info),
                    Ok(None) => {},
                    Err(e) => yield Err(e),
                };
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        Self::metadata(path, &metadata)
    }

    async fn set_times(&self, path: &Path, accessed: OffsetDateTime, modified: OffsetDateTime) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        let relative = path.to_path_buf();
        let times = FileTimes::new()
            .set_accessed(SystemTime::from(accessed))
            .set_modified(SystemTime::from(modified));
        // Tokio has no async equivalent of `File::set_times`.
        tokio::task::spawn_blocking(move || {
            OpenOptions::new()
                .write(true)
                .open(&abs_path)
                .and_then(|file| file.set_times(times))
                .map_err(|e| Self::map_io_error(e, &relative))
        })
        .await
        .or_raise(|| ErrorKind::Interrupted("set_times task panicked".to_string()))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use time::macros::datetime;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_root_but_open_does_not() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("recover");
        let err = LocalBackend::open("name", &root).err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        LocalBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
        assert!(LocalBackend::open("name", &root).is_ok());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("torrents/x.torrent");
        assert_eq!(backend.absolute_path(Path::new("torrents/x.torrent")).unwrap(), expected);
        assert_eq!(backend.absolute_path(Path::new("/torrents/x.torrent")).unwrap(), expected);
        // Path traversal is prevented
        assert!(backend.absolute_path(Path::new("../etc/passwd")).is_err());
    }

    #[tokio::test]
    async fn test_paths_under_the_root_resolve_in_place() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::open("sources", temp_dir.path()).unwrap();
        let config = temp_dir.path().join("vuze").join("downloads.config");
        assert_eq!(backend.absolute_path(&config).unwrap(), config);

        backend.write(&config, b"de").await.unwrap();
        assert!(config.exists());
        assert_eq!(backend.read(&config).await.unwrap(), b"de");
        assert_eq!(backend.read(Path::new("vuze/downloads.config")).await.unwrap(), b"de");
        let listed = backend.list(&temp_dir.path().join("vuze")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(backend.read(&listed[0].path).await.unwrap(), b"de");
    }

    /// The binary roots its source backend at the top ancestor of the data
    /// directory (`/` or a drive root) and passes fully qualified paths.
    #[test]
    fn test_filesystem_root_accepts_qualified_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().ancestors().last().unwrap();
        let backend = LocalBackend::open("sources", root).unwrap();
        let file = temp_dir.path().join("downloads.config");
        assert_eq!(backend.absolute_path(&file).unwrap(), file);
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let data = b"d4:infodee";
        backend.write(Path::new("x.torrent"), data).await.unwrap();
        let read_data = backend.read(Path::new("x.torrent")).await.unwrap();
        assert_eq!(read_data, data);
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("active/ABC.dat"), b"de").await.unwrap();
        assert!(backend.exists(Path::new("active/ABC.dat")).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(!backend.exists(Path::new("nonexistent.txt")).await.unwrap());
        backend.write(Path::new("exists.txt"), b"data").await.unwrap();
        assert!(backend.exists(Path::new("exists.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let err = backend.read(Path::new("missing.torrent")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stat() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let data = b"Hello, world!";
        backend.write(Path::new("file.txt"), data).await.unwrap();
        let info = backend.stat(Path::new("file.txt")).await.unwrap();
        assert_eq!(info.path, PathBuf::from("file.txt"));
        assert_eq!(info.size, data.len() as u64);
        assert!(info.is_file());
    }

    #[tokio::test]
    async fn test_set_times() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("x.torrent"), b"de").await.unwrap();
        let accessed = datetime!(2020-01-01 12:00 UTC);
        let modified = datetime!(2019-05-05 08:30 UTC);
        backend.set_times(Path::new("x.torrent"), accessed, modified).await.unwrap();
        let info = backend.stat(Path::new("x.torrent")).await.unwrap();
        assert_eq!(info.modified, modified);
        let err = backend.set_times(Path::new("missing"), accessed, modified).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_is_shallow() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("torrents/a.torrent"), b"de").await.unwrap();
        backend.write(Path::new("torrents/b.torrent"), b"de").await.unwrap();
        backend.write(Path::new("torrents/nested/c.torrent"), b"de").await.unwrap();
        let mut files = backend.list(Path::new("torrents")).await.unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let listed: Vec<_> = files.iter().map(|f| (f.path.clone(), f.is_dir())).collect();
        assert_eq!(
            listed,
            vec![
                (PathBuf::from("torrents/a.torrent"), false),
                (PathBuf::from("torrents/b.torrent"), false),
                (PathBuf::from("torrents/nested"), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_keeps_caller_path_form() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = LocalBackend::open("root", "/").unwrap();
        let dir = temp_dir.path().join("torrents");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("x.torrent"), b"de").unwrap();
        let files = root.list(&dir).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, dir.join("x.torrent"));
    }

    #[tokio::test]
    async fn test_list_nonexistent_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let files = backend.list(Path::new("nonexistent")).await.unwrap();
        assert_eq!(files.len(), 0);
    }

    #[tokio::test]
    async fn test_path_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        // Attempts to escape the root should fail
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.read(Path::new("etc/../../passwd")).await.is_err());
        assert!(backend.write(Path::new("../etc/passwd"), b"data").await.is_err());
        assert!(backend.list(Path::new("../..")).await.is_err());
    }
}
