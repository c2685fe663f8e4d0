//! The recovery engine.
//!
//! Everything here works against two [storage backends](revive_storage): a
//! read-only view of the client's data and backup directories, and a writable
//! recovery tree. Nothing is ever written back to the sources.
//!
//! A run looks like this:
//! 1. [`downloads::load_document`] reads the client's download list and
//!    [`downloads::expected_records`] checks every torrent it references.
//! 2. One of the [`recover`] strategies maps the missing torrents to
//!    replacements (by file name, by [content index](index) or from the live
//!    state files).
//! 3. [`patch::apply`] stages the replacements into the recovery tree and
//!    rewrites the download list to point at them.
//!
//! [`repair`] is independent of all of the above: it fixes the per-download
//! state files in the client's `active` directory.

mod context;
pub mod discover;
pub mod downloads;
pub mod error;
pub mod index;
pub mod patch;
pub mod recover;
pub mod repair;

pub use crate::context::Context;
pub use revive_storage::{path_from_bytes, path_to_bytes};

/// Number of files checked concurrently when a list of paths is verified.
pub const MAX_PROCESS_CONCURRENCY: usize = 32;
