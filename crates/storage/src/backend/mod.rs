//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for the handful of filesystem operations recovery needs, so the
//! engine can be pointed at a real disk or at an in-memory fixture.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::FileInfo;
use crate::error::Result;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;
use time::OffsetDateTime;

type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// All storage operations are asynchronous so that directory scans can run
/// concurrently without blocking the runtime.
///
/// # Path Handling
/// All paths are relative to the storage root and are validated using
/// [`validate_path`](crate::validate_path) before use. Absolute paths are
/// interpreted relative to the root as well.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use revive_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_downloads_config(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("downloads.config");
///     if backend.exists(path).await? {
///         Ok(backend.stat(path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// List the immediate children of a directory.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, dir: &Path) -> Result<Vec<FileInfo>> {
        self.list_stream(dir).try_collect().await
    }

    /// Stream the immediate children (files and directories) of a directory.
    ///
    /// Listing is not recursive. Entries are yielded in no particular order
    /// with paths of the form `dir.join(name)`. A directory that doesn't
    /// exist is empty, not an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use std::path::Path;
    /// # use revive_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(Path::new("/backups/2024-01-01/torrents"));
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, dir: &'a Path) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents.
    ///
    /// Creates a new file or overwrites an existing file with the provided
    /// data. Parent directories are created as needed.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use revive_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// backend.write(Path::new("torrents/x.torrent"), b"d4:infodee").await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Set the access and modification times of an existing file.
    async fn set_times(&self, path: &Path, accessed: OffsetDateTime, modified: OffsetDateTime) -> Result<()>;
}
