//! Storage errors.
//!
//! Recovery treats most of these as "this copy is unusable, try the next
//! one", so callers mostly care about [`ErrorKind::is_not_found`].

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Any other I/O failure.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Empty, relative where an absolute root is needed, or climbing out of
    /// the backend root.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// A blocking filesystem task never completed.
    #[display("interrupted: {_0}")]
    Interrupted(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Interrupted(_))
    }

    /// The file (or its directory) simply isn't there. Expected for most
    /// candidate paths tried during recovery.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
