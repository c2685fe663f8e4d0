use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::index::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::StreamExt;
use revive_cache::{BackupEntry, ContentIndex, Repository};
use revive_storage::BackendHandle;
use revive_torrent::{InfoHash, info_hash, is_torrent_path};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Entries found by concurrent directory scans.
///
/// This map is the only state shared between scan tasks; every insert takes
/// the lock.
#[derive(Default)]
struct SharedEntries(Mutex<HashMap<InfoHash, Vec<BackupEntry>>>);

impl SharedEntries {
    async fn insert(&self, hash: InfoHash, entry: BackupEntry) {
        self.0.lock().await.entry(hash).or_default().push(entry);
    }

    async fn take(&self) -> HashMap<InfoHash, Vec<BackupEntry>> {
        std::mem::take(&mut *self.0.lock().await)
    }
}

/// Counts for one scanned directory.
#[derive(Debug, Default, Clone, Copy)]
struct ScanSummary {
    indexed: usize,
    skipped: usize,
}

/// Outcome of [`build_and_persist`].
#[derive(Debug, Clone)]
pub struct IndexBuild {
    pub index: ContentIndex,
    /// Roots scanned by this build. Empty when the stored index already
    /// covered everything.
    pub scanned: Vec<PathBuf>,
    /// Whether the index on disk matches `index`.
    pub persisted: bool,
}

impl IndexBuild {
    /// The stored index was used as is.
    pub fn reused(&self) -> bool {
        self.scanned.is_empty()
    }
}

/// Extend `existing` (or a new index) with every root in `roots` it hasn't
/// scanned yet.
///
/// Each root's torrents directory is scanned by its own task; at most
/// `max_concurrency` run at once. If every root is already covered, the
/// existing index is returned unchanged.
pub async fn build(
    ctx: &Context,
    roots: &[PathBuf],
    max_concurrency: usize,
    existing: Option<ContentIndex>,
) -> LibraryResult<ContentIndex> {
    let (index, _) = build_inner(ctx, roots, max_concurrency, existing).await.or_raise(|| LibraryErrorKind::Index)?;
    Ok(index)
}

/// Load the stored index from `repo`, [`build`] on top of it and store the
/// result.
///
/// The cache is a convenience: a stored index that can't be loaded is
/// rebuilt from scratch, and one that can't be saved is still returned (with
/// [`persisted`](IndexBuild::persisted) unset).
pub async fn build_and_persist(
    ctx: &Context,
    repo: &Repository,
    roots: &[PathBuf],
    max_concurrency: usize,
) -> LibraryResult<IndexBuild> {
    let existing = match repo.load().await {
        Ok(existing) => existing,
        Err(e) => {
            warn!(error = ?e, "Could not load stored content index, rebuilding");
            None
        },
    };
    let loaded = existing.is_some();
    let (index, scanned) =
        build_inner(ctx, roots, max_concurrency, existing).await.or_raise(|| LibraryErrorKind::Index)?;

    let persisted = if loaded && scanned.is_empty() {
        true
    } else {
        match repo.save(&index).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = ?e, "Could not store content index");
                false
            },
        }
    };

    let stats = index.stats();
    info!(
        built_at = ?stats.built_at,
        directories = stats.directories,
        unique_hashes = stats.unique_hashes,
        entries = stats.entries,
        scanned = scanned.len(),
        persisted,
        "Content index ready"
    );
    Ok(IndexBuild { index, scanned, persisted })
}

#[instrument(skip_all, fields(roots = roots.len(), max_concurrency = max_concurrency))]
async fn build_inner(
    ctx: &Context,
    roots: &[PathBuf],
    max_concurrency: usize,
    existing: Option<ContentIndex>,
) -> Result<(ContentIndex, Vec<PathBuf>)> {
    let mut index = existing.unwrap_or_default();
    let pending: Vec<PathBuf> = index.missing(roots).into_iter().cloned().collect();
    if pending.is_empty() && index.built_at().is_some() {
        debug!(directories = index.directories().len(), "Content index already covers every root");
        return Ok((index, pending));
    }
    info!(pending = pending.len(), covered = index.directories().len(), "Scanning backup roots");

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let shared = Arc::new(SharedEntries::default());
    let mut tasks = JoinSet::new();
    for root in &pending {
        // Waits here until a running scan finishes.
        let permit = semaphore.clone().acquire_owned().await.or_raise(|| ErrorKind::Admission)?;
        let sources = ctx.sources.clone();
        let directory = ctx.torrents_dir_of(root);
        let shared = shared.clone();
        tasks.spawn(async move {
            let summary = scan_directory(&sources, &directory, &shared).await;
            drop(permit);
            summary
        });
    }

    let mut total = ScanSummary::default();
    while let Some(joined) = tasks.join_next().await {
        let summary = joined.or_raise(|| ErrorKind::Task)?;
        total.indexed += summary.indexed;
        total.skipped += summary.skipped;
    }
    debug!(indexed = total.indexed, skipped = total.skipped, "Finished scanning backup roots");

    index.merge(pending.iter().cloned(), shared.take().await, OffsetDateTime::now_utc());
    Ok((index, pending))
}

/// Hash every torrent file directly inside `directory`.
#[instrument(skip_all, fields(directory = %directory.display()))]
async fn scan_directory(sources: &BackendHandle, directory: &Path, shared: &SharedEntries) -> ScanSummary {
    let mut summary = ScanSummary::default();
    let mut listing = sources.list_stream(directory);
    while let Some(item) = listing.next().await {
        let file = match item {
            Ok(file) => file,
            Err(e) => {
                warn!(error = ?e, "Could not list directory entry");
                summary.skipped += 1;
                continue;
            },
        };
        if !file.is_file() || !is_torrent_path(&file.path) {
            continue;
        }
        let data = match sources.read(&file.path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %file.path.display(), error = ?e, "Could not read torrent file");
                summary.skipped += 1;
                continue;
            },
        };
        match info_hash(&data) {
            Ok(hash) => {
                shared.insert(hash, BackupEntry::new(file.path, file.modified)).await;
                summary.indexed += 1;
            },
            Err(e) => {
                debug!(path = %file.path.display(), error = ?e, "Skipping corrupt torrent file");
                summary.skipped += 1;
            },
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_stream::stream;
    use async_trait::async_trait;
    use futures::Stream;
    use revive_cache::Database;
    use revive_storage::backend::{MockBackend, StorageBackend};
    use revive_storage::error::Result as StorageResult;
    use revive_storage::{FileInfo, path_from_bytes};
    use rstest::rstest;
    use std::collections::BTreeSet;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use time::macros::datetime;

    /// Records how many directory listings are being consumed at once.
    struct ListingGauge {
        inner: MockBackend,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ListingGauge {
        fn new(inner: MockBackend) -> Self {
            Self { inner, active: AtomicUsize::new(0), peak: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl StorageBackend for ListingGauge {
        fn name(&self) -> &str {
            "gauge"
        }

        fn list_stream<'a>(&'a self, dir: &'a Path) -> Pin<Box<dyn Stream<Item = StorageResult<FileInfo>> + Send + 'a>> {
            Box::pin(stream! {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                let mut inner = self.inner.list_stream(dir);
                while let Some(item) = inner.next().await {
                    yield item;
                }
                self.active.fetch_sub(1, Ordering::SeqCst);
            })
        }

        async fn exists(&self, path: &Path) -> StorageResult<bool> {
            self.inner.exists(path).await
        }

        async fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
            self.inner.read(path).await
        }

        async fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
            self.inner.write(path, data).await
        }

        async fn stat(&self, path: &Path) -> StorageResult<FileInfo> {
            self.inner.stat(path).await
        }

        async fn set_times(&self, path: &Path, accessed: OffsetDateTime, modified: OffsetDateTime) -> StorageResult<()> {
            self.inner.set_times(path, accessed, modified).await
        }
    }

    fn torrent(name: &str) -> Vec<u8> {
        format!("d4:infod4:name{}:{}ee", name.len(), name).into_bytes()
    }

    fn hash_of(name: &str) -> InfoHash {
        info_hash(torrent(name)).unwrap()
    }

    fn context() -> Context {
        let sources = MockBackend::default()
            .with_file("/b1/torrents/x.torrent", torrent("x"), datetime!(2023-01-01 00:00 UTC))
            .with_file("/b1/torrents/y.torrent", torrent("y"), datetime!(2023-01-01 00:00 UTC))
            .with_file("/b1/torrents/broken.torrent", b"d4:info".to_vec(), datetime!(2023-01-01 00:00 UTC))
            .with_file("/b1/torrents/notes.txt", b"d4:infodee".to_vec(), datetime!(2023-01-01 00:00 UTC))
            .with_file("/b1/torrents/nested/z.torrent", torrent("z"), datetime!(2023-01-01 00:00 UTC))
            .with_file("/b2/torrents/x-renamed.torrent", torrent("x"), datetime!(2024-01-01 00:00 UTC))
            .with_file("/b3/torrents/z.torrent", torrent("z"), datetime!(2022-01-01 00:00 UTC));
        Context::new(Arc::new(sources), Arc::new(MockBackend::default()), "/data")
    }

    /// Index contents without regard to order within equal timestamps.
    fn contents(index: &ContentIndex) -> BTreeSet<(InfoHash, PathBuf)> {
        index
            .iter()
            .flat_map(|(hash, entries)| entries.iter().map(move |entry| (*hash, entry.path.clone())))
            .collect()
    }

    fn roots(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[tokio::test]
    async fn test_build_scans_torrent_files_only() {
        let ctx = context();
        let index = build(&ctx, &roots(&["/b1", "/b2"]), 2, None).await.unwrap();
        assert_eq!(index.directories(), &roots(&["/b1", "/b2"]));
        let stats = index.stats();
        assert_eq!((stats.unique_hashes, stats.entries), (2, 3));
        assert!(index.get(&hash_of("z")).is_empty());
        // Freshest first.
        assert_eq!(index.freshest(&hash_of("x")).unwrap().path, PathBuf::from("/b2/torrents/x-renamed.torrent"));
    }

    #[tokio::test]
    async fn test_build_is_idempotent() {
        let ctx = context();
        let first = build(&ctx, &roots(&["/b1", "/b2", "/b3"]), 1, None).await.unwrap();
        let second = build(&ctx, &roots(&["/b1", "/b2", "/b3"]), 3, None).await.unwrap();
        assert_eq!(contents(&first), contents(&second));
    }

    #[tokio::test]
    async fn test_build_resumes() {
        let ctx = context();
        let partial = build(&ctx, &roots(&["/b1"]), 2, None).await.unwrap();
        let resumed = build(&ctx, &roots(&["/b1", "/b3"]), 2, Some(partial)).await.unwrap();
        let one_pass = build(&ctx, &roots(&["/b1", "/b3"]), 2, None).await.unwrap();
        assert_eq!(contents(&resumed), contents(&one_pass));
        let dirs = |index: &ContentIndex| index.directories().iter().cloned().collect::<BTreeSet<_>>();
        assert_eq!(dirs(&resumed), dirs(&one_pass));
    }

    #[tokio::test]
    async fn test_covered_index_is_returned_unchanged() {
        let ctx = context();
        let index = build(&ctx, &roots(&["/b1", "/b2"]), 2, None).await.unwrap();
        let again = build(&ctx, &roots(&["/b2"]), 2, Some(index.clone())).await.unwrap();
        assert_eq!(again, index);
    }

    #[tokio::test]
    async fn test_build_and_persist_round_trip() {
        let ctx = context();
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);

        let first = build_and_persist(&ctx, &repo, &roots(&["/b1"]), 2).await.unwrap();
        assert!(first.persisted);
        assert_eq!(first.scanned, roots(&["/b1"]));
        assert!(!first.reused());

        let second = build_and_persist(&ctx, &repo, &roots(&["/b1"]), 2).await.unwrap();
        assert!(second.reused());
        assert_eq!(contents(&second.index), contents(&first.index));

        let third = build_and_persist(&ctx, &repo, &roots(&["/b1", "/b2"]), 2).await.unwrap();
        assert_eq!(third.scanned, roots(&["/b2"]));
        let stored = repo.load().await.unwrap().unwrap();
        assert_eq!(contents(&stored), contents(&third.index));
        assert_eq!(stored.directories(), &roots(&["/b1", "/b2"]));
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scans_never_exceed_max_concurrency(#[case] max_concurrency: usize) {
        let names = ["a", "b", "c", "d", "e", "f"];
        let sources = MockBackend::with_files(names.map(|name| (format!("/b-{name}/torrents/{name}.torrent"), torrent(name))));
        let gauge = Arc::new(ListingGauge::new(sources));
        let ctx = Context::new(gauge.clone(), Arc::new(MockBackend::default()), "/data");
        let roots: Vec<PathBuf> = names.iter().map(|name| PathBuf::from(format!("/b-{name}"))).collect();

        let index = build(&ctx, &roots, max_concurrency, None).await.unwrap();
        assert_eq!(index.stats().entries, names.len());
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!((1..=max_concurrency).contains(&peak), "peak of {peak} concurrent scans");
        assert_eq!(gauge.active.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_names_are_persisted() {
        let sources = MockBackend::default()
            .with_file("/b1/torrents/x.torrent", torrent("x"), datetime!(2023-01-01 00:00 UTC))
            .with_file(path_from_bytes(b"/b1/torrents/caf\xe9.torrent"), torrent("cafe"), datetime!(2023-01-01 00:00 UTC));
        let ctx = Context::new(Arc::new(sources), Arc::new(MockBackend::default()), "/data");
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);

        let first = build_and_persist(&ctx, &repo, &roots(&["/b1"]), 2).await.unwrap();
        assert_eq!(first.index.stats().entries, 2);
        assert!(first.persisted);
        assert!(repo.load().await.unwrap().is_some());

        let second = build_and_persist(&ctx, &repo, &roots(&["/b1"]), 2).await.unwrap();
        assert!(second.reused());
        assert_eq!(contents(&second.index), contents(&first.index));
    }
}
