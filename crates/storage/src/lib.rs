//! Filesystem access for the recovery engine.
//!
//! Everything that touches a disk goes through a [`StorageBackend`]. The
//! binary wires up two of them: a [`ReadOnlyBackend`](backend::ReadOnlyBackend)
//! over the client's data and backup directories (sources are never
//! modified), and a writable [`LocalBackend`](backend::LocalBackend) rooted
//! at the recovery directory. Tests swap both for a
//! [`MockBackend`](backend::MockBackend) (feature `mock`).

pub mod backend;
mod bytes;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::bytes::{path_from_bytes, path_to_bytes};
pub use crate::models::{FileInfo, FileKind};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
