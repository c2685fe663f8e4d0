//! Repairing the client's per-download state files.
//!
//! Every download in `active/` is backed by up to four copies of the same
//! document (see [`StateFile`](revive_torrent::state::StateFile)). The client
//! refuses to resume a download whose primary copy is corrupt, even when a
//! perfectly good backup or temporary is sitting right next to it.
//! [`repair`] checks each download's copies and writes a consistent
//! primary/backup pair for it into the recovery tree.

pub mod error;
mod health;
mod stream;

pub use self::health::{Decision, StateFileHealth, VariantHealth};
pub use self::stream::{RepairEvent, RepairOutcome, RepairReport, repair, repair_all};
