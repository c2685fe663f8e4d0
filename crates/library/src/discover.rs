//! Finding backup snapshots.
//!
//! Backups are kept as date-stamped copies of the client's data directory
//! (`/backups/2024-01-31/`, `/backups/vuze-2024-02-01/`, ...) under one or
//! more parent directories.

use futures::StreamExt;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use revive_storage::BackendHandle;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, instrument, warn};

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

regex!(BACKUP_DATE_REGEX, r"\d{4}-\d{2}-\d{2}");

/// Does this directory name look like a dated backup?
pub fn is_backup_name(name: &str) -> bool {
    BACKUP_DATE_REGEX.is_match(name)
}

/// List the dated backup snapshots directly inside each of `parents`, newest
/// name first.
///
/// A parent that can't be listed is logged and skipped.
#[instrument(skip_all, fields(parents = parents.len()))]
pub async fn backup_roots(sources: &BackendHandle, parents: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    for parent in parents {
        let mut children = sources.list_stream(parent);
        while let Some(child) = children.next().await {
            let child = match child {
                Ok(child) => child,
                Err(e) => {
                    warn!(parent = %parent.display(), error = ?e, "Could not list backup directory");
                    break;
                },
            };
            if child.is_dir() && child.file_name().is_some_and(is_backup_name) {
                roots.push(child.path);
            }
        }
    }
    roots.sort_unstable_by(|a, b| b.cmp(a));
    roots.dedup();
    debug!(found = roots.len(), "Discovered backup directories");
    roots
}

/// The order in which the file name strategy searches for a missing torrent:
/// the client's own data directory first, then every backup in random order.
///
/// Shuffling spreads the reads over backups of different ages rather than
/// always hammering the newest one. Duplicates are removed, keeping the
/// first occurrence.
pub fn candidate_roots<R: Rng + ?Sized>(data_dir: &Path, backups: &[PathBuf], rng: &mut R) -> Vec<PathBuf> {
    let mut shuffled = backups.to_vec();
    shuffled.shuffle(rng);
    data_dir_first(data_dir, shuffled)
}

/// The directories the content index covers: the data directory itself (a
/// download may be listed under one name while its torrent survives under
/// another) followed by every backup, in discovery order.
pub fn index_roots(data_dir: &Path, backups: &[PathBuf]) -> Vec<PathBuf> {
    data_dir_first(data_dir, backups.iter().cloned())
}

fn data_dir_first(data_dir: &Path, rest: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    std::iter::once(data_dir.to_path_buf())
        .chain(rest)
        .filter(|root| seen.insert(root.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use revive_storage::backend::MockBackend;
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case("2024-01-31", true)]
    #[case("vuze-2024-01-31-nightly", true)]
    #[case("2024-1-31", false)]
    #[case("latest", false)]
    fn test_is_backup_name(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_backup_name(name), expected);
    }

    #[tokio::test]
    async fn test_backup_roots() {
        let sources: BackendHandle = Arc::new(MockBackend::with_files([
            ("/backups/2024-01-01/torrents/a.torrent", "de"),
            ("/backups/2024-03-01/torrents/a.torrent", "de"),
            ("/backups/latest/torrents/a.torrent", "de"),
            ("/backups/2024-02-01.txt", "not a directory"),
            ("/more/2023-12-31/downloads.config", "de"),
        ]));
        let parents = vec![PathBuf::from("/backups"), PathBuf::from("/more"), PathBuf::from("/missing")];
        let roots = backup_roots(&sources, &parents).await;
        assert_eq!(
            roots,
            vec![
                PathBuf::from("/more/2023-12-31"),
                PathBuf::from("/backups/2024-03-01"),
                PathBuf::from("/backups/2024-01-01"),
            ]
        );
    }

    #[test]
    fn test_candidate_roots_data_dir_first_and_unique() {
        let backups = vec![
            PathBuf::from("/b/2024-01-01"),
            PathBuf::from("/data"),
            PathBuf::from("/b/2024-01-02"),
            PathBuf::from("/b/2024-01-01"),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let roots = candidate_roots(Path::new("/data"), &backups, &mut rng);
        assert_eq!(roots[0], PathBuf::from("/data"));
        assert_eq!(roots.len(), 3);
        let unique: HashSet<_> = roots.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_index_roots_keep_discovery_order() {
        let backups = vec![
            PathBuf::from("/b/2024-01-02"),
            PathBuf::from("/data"),
            PathBuf::from("/b/2024-01-01"),
            PathBuf::from("/b/2024-01-02"),
        ];
        assert_eq!(
            index_roots(Path::new("/data"), &backups),
            vec![PathBuf::from("/data"), PathBuf::from("/b/2024-01-02"), PathBuf::from("/b/2024-01-01")]
        );
        assert_eq!(index_roots(Path::new("/data"), &[]), vec![PathBuf::from("/data")]);
    }
}
