//! Bencode, as spoken by torrent files and the client's own bookkeeping.
//!
//! The same self-describing format is used for `.torrent` files, for the
//! per-download `active/*.dat` state files and for `downloads.config`. This
//! crate decodes all of them into one generic [`Value`] tree and writes the
//! tree back out.
//!
//! Two properties matter more here than in a general-purpose codec:
//!
//! - **Round-trip fidelity.** [`Dict`] preserves decoded key order, and the
//!   decoder rejects every non-canonical spelling, so `encode(decode(x)) == x`
//!   for any `x` that decodes.
//! - **Cheap validity checks.** [`is_valid`] is the corruption test used
//!   everywhere a candidate file has to be accepted or rejected.

mod decode;
mod encode;
pub mod error;
mod value;

pub use crate::decode::{decode, is_valid, raw_value};
pub use crate::encode::encode;
pub use crate::value::{Dict, Value};

/// Maximum nesting of lists and dictionaries accepted by the decoder.
pub const MAX_DEPTH: usize = 256;
