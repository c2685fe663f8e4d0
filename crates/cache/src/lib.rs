//! Persistent content index.
//!
//! The [`ContentIndex`] maps torrent info-hashes to every copy of that torrent
//! found across the backup directories. Building it means reading and hashing
//! every torrent in every backup, which is slow, so the result is kept in a
//! small SQLite database next to the recovered files and reused (and extended
//! with newly added backup directories) on the next run.
//!
//! The database is not the source of truth: the backups themselves are. If
//! it's deleted, it's rebuilt by scanning again.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{BackupEntry, ContentIndex, IndexStats};
pub use crate::repo::Repository;

/// File name of the index database inside the recovery directory.
pub const INDEX_FILE_NAME: &str = "content-index.sqlite";
