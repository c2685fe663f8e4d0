//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Clone)]
struct MockFile {
    data: Vec<u8>,
    modified: OffsetDateTime,
    accessed: OffsetDateTime,
    created: Option<OffsetDateTime>,
}

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Directories are
/// implied by the paths of the files inside them.
///
/// # Examples
///
/// ```
/// use revive_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("/data/torrents/x.torrent", b"d4:infodee"),
/// ]);
/// assert!(backend.exists(Path::new("/data/torrents/x.torrent")).await?);
///
/// backend.write(Path::new("/data/downloads.config"), b"de").await?;
/// assert!(backend.exists(Path::new("/data/downloads.config")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, MockFile>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut backend = Self {
            name: "mock".to_string(),
            storage: RwLock::new(HashMap::new()),
        };
        for (path, data) in files {
            backend = backend.with_file(path, data, now);
        }
        backend
    }

    /// Add a file with a specific modification time.
    ///
    /// # Example
    ///
    /// ```
    /// use revive_storage::backend::MockBackend;
    /// use time::OffsetDateTime;
    ///
    /// let backend = MockBackend::default()
    ///     .with_file("/backup/torrents/old.torrent", b"de", OffsetDateTime::UNIX_EPOCH);
    /// ```
    pub fn with_file(mut self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>, modified: OffsetDateTime) -> Self {
        let path = path.into();
        let Ok(validated) = validate_path(&path) else {
            // The panic here is DELIBERATE. MockBackend is intended to be
            // used in tests; panics are expected. There is no error result.
            panic!("MockBackend::with_file: invalid path {}", path.display());
        };
        let file = MockFile {
            data: data.into(),
            modified,
            accessed: modified,
            created: None,
        };
        self.storage.get_mut().insert(validated, file);
        self
    }

    /// Record a creation time for an existing file (platforms without birth
    /// times are the default).
    pub fn with_created(mut self, path: impl AsRef<Path>, created: OffsetDateTime) -> Self {
        let path = path.as_ref();
        let file = match validate_path(path) {
            Ok(validated) => self.storage.get_mut().get_mut(&validated),
            Err(_) => None,
        };
        let Some(file) = file else {
            panic!("MockBackend::with_created: no such file {}", path.display());
        };
        file.created = Some(created);
        self
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Every file path currently stored, sorted (in validated, root-relative
    /// form).
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.storage.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn file_info(path: &Path, file: &MockFile) -> FileInfo {
        FileInfo::new(path, file.data.len() as u64, file.modified)
            .with_accessed(file.accessed)
            .with_created(file.created)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, dir: &'a Path) -> FileInfoStream<'a> {
        let validated = match validate_path(dir) {
            Ok(validated) => validated,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let (files, directories) = {
                let guard = self.storage.read().await;
                let mut files = Vec::new();
                let mut directories = BTreeMap::new();
                for (path, file) in guard.iter() {
                    let Ok(rest) = path.strip_prefix(&validated) else { continue };
                    let mut components = rest.components();
                    let Some(first) = components.next() else { continue };
                    match components.next() {
                        None => files.push(Self::file_info(&dir.join(first), file)),
                        Some(_) => { directories.entry(dir.join(first)).or_insert(file.modified); },
                    }
                }
                (files, directories)
            };
            for info in files {
                yield Ok(info);
            }
            for (path, modified) in directories {
                yield Ok(FileInfo::directory(path, modified));
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let validated = validate_path(path)?;
        let guard = self.storage.read().await;
        let file = guard.get(&validated).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.to_path_buf())))?;
        Ok(file.data.clone())
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        let now = OffsetDateTime::now_utc();
        let mut guard = self.storage.write().await;
        let created = guard.get(&path).and_then(|existing| existing.created);
        guard.insert(
            path,
            MockFile {
                data: data.to_vec(),
                modified: now,
                accessed: now,
                created,
            },
        );
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let validated = validate_path(path)?;
        let guard = self.storage.read().await;
        let file = guard.get(&validated).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.to_path_buf())))?;
        Ok(Self::file_info(path, file))
    }

    async fn set_times(&self, path: &Path, accessed: OffsetDateTime, modified: OffsetDateTime) -> Result<()> {
        let validated = validate_path(path)?;
        let mut guard = self.storage.write().await;
        let file =
            guard.get_mut(&validated).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.to_path_buf())))?;
        file.accessed = accessed;
        file.modified = modified;
        Ok(())
    }
}
