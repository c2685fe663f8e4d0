//! Error types for the [`index`](super) module.

use derive_more::{Display, Error};

/// An index build error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index build operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the build itself. Unreadable or corrupt torrent files are not
/// errors: they're logged and left out of the index.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The admission semaphore was closed while scans were being started.
    #[display("scan admission closed")]
    Admission,
    /// A directory scan task panicked or was cancelled.
    #[display("directory scan task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
