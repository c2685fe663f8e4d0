//! Error types for the [`recover`](super) module.
//!
//! Apart from [`ErrorKind::Worker`], these describe why a single torrent
//! couldn't be recovered; they're logged and the run carries on.

use derive_more::{Display, Error};

/// A recovery error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for recovery operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reading a source or writing into the recovery tree failed.
    #[display("storage operation failed")]
    Storage,
    /// A state file could not be turned into a torrent.
    #[display("state file does not contain a usable torrent")]
    Torrent,
    /// A worker task died before accounting for all of its work.
    #[display("recovery worker failed")]
    Worker,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
