//! Loading and saving the content index.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{BackupEntry, ContentIndex, EntryRow, datetime_to_nanos, nanos_to_datetime};
use exn::{OptionExt, ResultExt};
use revive_storage::{path_from_bytes, path_to_bytes};
use revive_torrent::InfoHash;
use sqlx::SqlitePool;
use tracing::instrument;

/// Repository for the persisted [`ContentIndex`].
///
/// The index is stored as a whole: [`save`](Self::save) replaces whatever was
/// there before in a single transaction, so a crash mid-save leaves the
/// previous index intact rather than half of a new one.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the persisted index, if one has ever been saved.
    #[instrument(skip_all)]
    pub async fn load(&self) -> Result<Option<ContentIndex>> {
        let meta: Option<(i64,)> = sqlx::query_as(include_str!("../queries/get_meta.sql"))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some((built_at,)) = meta else {
            return Ok(None);
        };
        let directories: Vec<(Vec<u8>,)> = sqlx::query_as(include_str!("../queries/list_directories.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let rows: Vec<EntryRow> = sqlx::query_as(include_str!("../queries/list_entries.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let entries = rows.into_iter().map(<(InfoHash, BackupEntry)>::try_from).collect::<Result<Vec<_>>>()?;
        let directories = directories.into_iter().map(|(path,)| path_from_bytes(&path)).collect();
        Ok(Some(ContentIndex::from_parts(directories, entries, nanos_to_datetime(built_at)?)))
    }

    /// Replace the persisted index with `index`.
    #[instrument(skip_all, fields(directories = index.directories().len()))]
    pub async fn save(&self, index: &ContentIndex) -> Result<()> {
        let built_at = index.built_at().ok_or_raise(|| ErrorKind::InvalidData("index was never built"))?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear_entries.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear_directories.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/upsert_meta.sql"))
            .bind(datetime_to_nanos(built_at)?)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (position, directory) in index.directories().iter().enumerate() {
            sqlx::query(include_str!("../queries/insert_directory.sql"))
                .bind(i64::try_from(position).or_raise(|| ErrorKind::InvalidData("directory count"))?)
                .bind(path_to_bytes(directory))
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        for (hash, entries) in index.iter() {
            for entry in entries {
                let row = EntryRow::try_from((hash, entry))?;
                sqlx::query(include_str!("../queries/insert_entry.sql"))
                    .bind(row.info_hash)
                    .bind(row.path)
                    .bind(row.modified_at)
                    .execute(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
            }
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(entries = index.stats().entries, "saved content index");
        Ok(())
    }
}
