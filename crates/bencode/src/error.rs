//! Codec Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A decoding error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant means the same thing to a caller: the document is malformed
/// and retrying with the same bytes will fail again. The offsets are kept for
/// logging only.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input ended in the middle of a value.
    #[display("unexpected end of input at byte {offset}")]
    UnexpectedEof { offset: usize },
    /// A value started with a byte that is not `i`, `l`, `d` or a digit.
    #[display("invalid prefix byte 0x{byte:02x} at byte {offset}")]
    InvalidPrefix { offset: usize, byte: u8 },
    /// Integer is empty, non-canonical (leading zeros, `-0`, `+`) or overflows.
    #[display("invalid integer at byte {offset}")]
    InvalidInteger { offset: usize },
    /// Byte string length prefix is malformed or runs past the input.
    #[display("invalid byte string length at byte {offset}")]
    InvalidLength { offset: usize },
    /// Dictionary key that is not a byte string.
    #[display("dictionary key is not a byte string at byte {offset}")]
    InvalidDictKey { offset: usize },
    /// Bytes left over after the top-level value.
    #[display("trailing data at byte {offset}")]
    TrailingData { offset: usize },
    /// Nesting exceeded [`MAX_DEPTH`](crate::MAX_DEPTH).
    #[display("nesting too deep at byte {offset}")]
    TooDeep { offset: usize },
    /// The top-level value was expected to be a dictionary.
    #[display("top-level value is not a dictionary")]
    NotADictionary,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Bytes are either well-formed or they're not.
        false
    }
}
