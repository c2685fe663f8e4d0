//! Error types for the [`downloads`](super) module.

use derive_more::{Display, Error};

/// A download list error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for download list operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why the download list couldn't be used. All of these are fatal for a
/// recovery run: there is nothing to recover without the list.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file could not be read.
    #[display("could not read the download list")]
    Storage,
    /// The file is not a valid bencoded document.
    #[display("download list is corrupt")]
    Decode,
    /// The document decoded but has no `downloads` list.
    #[display("document has no downloads list")]
    MissingList,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
