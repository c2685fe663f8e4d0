use revive_storage::BackendHandle;
use revive_storage::error::Result as StorageResult;
use revive_torrent::state::STATE_DIRECTORY;
use std::path::{Path, PathBuf};

/// Where a recovery run reads from and writes to.
///
/// `sources` is addressed with absolute paths (the client's data directory
/// and every backup root live somewhere on it) and should be wrapped in a
/// [`ReadOnlyBackend`](revive_storage::backend::ReadOnlyBackend). `output` is
/// the recovery tree, addressed with paths relative to its root.
#[derive(Clone)]
pub struct Context {
    pub sources: BackendHandle,
    pub output: BackendHandle,
    /// The client's data directory.
    pub data_dir: PathBuf,
    /// The download list, on `sources`.
    pub downloads_config: PathBuf,
    /// Torrent directory name, relative to the data directory and to each
    /// backup root.
    pub torrents_dir: PathBuf,
}

impl Context {
    pub fn new(sources: BackendHandle, output: BackendHandle, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            sources,
            output,
            downloads_config: data_dir.join(crate::downloads::DOWNLOADS_CONFIG),
            data_dir,
            torrents_dir: PathBuf::from(revive_torrent::DEFAULT_TORRENTS_DIRECTORY),
        }
    }

    pub fn with_downloads_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.downloads_config = path.into();
        self
    }

    pub fn with_torrents_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.torrents_dir = dir.into();
        self
    }

    /// The client's live state directory.
    pub fn active_dir(&self) -> PathBuf {
        self.data_dir.join(STATE_DIRECTORY)
    }

    /// Canonical home of torrent files in the client's data directory.
    pub fn data_torrents_dir(&self) -> PathBuf {
        self.torrents_dir_of(&self.data_dir)
    }

    /// Torrent directory inside a backup root (or the data directory).
    pub fn torrents_dir_of(&self, root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(&self.torrents_dir)
    }

    /// Recovered torrent files, relative to the recovery tree.
    pub fn output_torrents_dir(&self) -> &Path {
        &self.torrents_dir
    }

    /// Repaired state files, relative to the recovery tree.
    pub fn output_active_dir(&self) -> &Path {
        Path::new(STATE_DIRECTORY)
    }

    /// Copy a source file into the recovery tree, then stamp the copy with
    /// the source's access and modification times.
    ///
    /// Failing to set the times is logged and otherwise ignored; the content
    /// is what matters.
    pub(crate) async fn copy_out(&self, source: &Path, destination: &Path) -> StorageResult<()> {
        let info = self.sources.stat(source).await?;
        let data = self.sources.read(source).await?;
        self.output.write(destination, &data).await?;
        let accessed = info.accessed.unwrap_or(info.modified);
        if let Err(e) = self.output.set_times(destination, accessed, info.modified).await {
            tracing::debug!(path = %destination.display(), error = ?e, "Could not preserve timestamps");
        }
        Ok(())
    }
}
