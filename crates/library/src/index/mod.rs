//! Building the [content index](revive_cache::ContentIndex).
//!
//! Hashing every torrent in every backup takes a while, so the index is
//! resumable: [`build`] only scans backup roots the index hasn't seen yet,
//! and [`build_and_persist`] loads the previous index from the cache before
//! building and saves the result afterwards.

mod build;
pub mod error;

pub use self::build::{IndexBuild, build, build_and_persist};
