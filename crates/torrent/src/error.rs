//! Torrent Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A torrent metadata error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for torrent metadata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The document is not valid bencode.
    #[display("malformed bencode document")]
    Decode,
    /// A required field could not be found in the document.
    #[display("missing required field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
    /// A field was found but has the wrong shape.
    #[display("invalid field: {_0}")]
    InvalidField(#[error(not(source))] &'static str),
    /// Not a 40 character hex string or not 20 raw bytes.
    #[display("invalid info-hash: {_0}")]
    InvalidHash(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // There are no retryable errors in this crate, the document is
        // either valid or its not.
        false
    }
}
