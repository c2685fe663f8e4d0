//! Error types for the [`repair`](super) module.

use derive_more::{Display, Error};

/// A repair error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for repair operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The state directory could not be listed.
    #[display("could not list state directory")]
    Discovery,
    /// Writing a repaired copy into the recovery tree failed.
    #[display("could not write repaired state for {_0}")]
    Write(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Discovery | Self::Write(_))
    }
}
