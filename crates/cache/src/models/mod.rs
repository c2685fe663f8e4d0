mod index;
mod row;

pub use self::index::{BackupEntry, ContentIndex, IndexStats};
pub(crate) use self::row::{EntryRow, datetime_to_nanos, nanos_to_datetime};
