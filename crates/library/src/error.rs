//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Each public module has its own
//! `error` submodule describing *what* failed inside it; the kinds here only
//! say *which* part of the engine a failure came out of.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load the download list")]
    Downloads,
    #[display("could not build the content index")]
    Index,
    #[display("recovery run failed")]
    Recover,
    #[display("state file repair failed")]
    Repair,
    #[display("could not write the patched download list")]
    Patch,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
