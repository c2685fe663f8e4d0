//! Error types for the [`patch`](super) module.

use derive_more::{Display, Error};

/// A patch error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for patch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reading a recovered file or writing into the recovery tree failed.
    #[display("storage operation failed")]
    Storage,
    /// The recovered file is no longer where the strategy found it.
    #[display("recovered file has disappeared")]
    SourceMissing,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
