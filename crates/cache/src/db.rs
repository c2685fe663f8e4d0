//! SQLite connection handling for the index database.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

use crate::INDEX_FILE_NAME;
use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// One load and one save per run; a second connection only matters when a
// save overlaps a straggling read.
const MAX_CONNECTIONS: u32 = 2;
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Handle on the index database.
///
/// Cloning is cheap (the pool is shared). Hand it to a
/// [`Repository`](crate::Repository) to read or replace the index.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the index database kept in `recovery_dir`.
    pub async fn open_in(recovery_dir: impl AsRef<Path>) -> Result<Self> {
        Self::connect(Self::path_in(recovery_dir)).await
    }

    /// Location of the index database inside `recovery_dir`.
    pub fn path_in(recovery_dir: impl AsRef<Path>) -> PathBuf {
        recovery_dir.as_ref().join(INDEX_FILE_NAME)
    }

    /// Open the database file at `path`, creating it and applying migrations
    /// as needed.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options, MAX_CONNECTIONS).await
    }

    /// Private in-memory database for tests in this and other crates.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every connection to ":memory:" gets its own empty database, so the
        // pool must never hold more than one.
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // after_connect runs for every pooled connection, not just the
            // first, so per-connection PRAGMAs belong here.
            .after_connect(|conn, meta| Box::pin(async move { Self::tune(conn, meta).await }))
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            // The backups are the source of truth; losing the last save on a
            // power cut only costs a rescan.
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
    }

    async fn tune(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        // A save deletes and reinserts every row; keep the WAL from growing
        // without bound during that transaction and keep temp b-trees off disk.
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA temp_store = MEMORY;
                PRAGMA cache_size = -4096;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("migrating index database", skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Flush and close every connection. The handle must not be used
    /// afterwards.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
