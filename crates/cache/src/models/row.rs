use crate::error::{Error, ErrorKind, Result};
use crate::models::BackupEntry;
use exn::ResultExt;
use revive_storage::{path_from_bytes, path_to_bytes};
use revive_torrent::InfoHash;
use time::OffsetDateTime;

#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub info_hash: Vec<u8>,
    pub path: Vec<u8>,
    pub modified_at: i64,
}
impl TryFrom<(&InfoHash, &BackupEntry)> for EntryRow {
    type Error = Error;
    fn try_from((hash, entry): (&InfoHash, &BackupEntry)) -> Result<Self> {
        Ok(Self {
            info_hash: hash.as_bytes().to_vec(),
            path: path_to_bytes(&entry.path),
            modified_at: datetime_to_nanos(entry.modified)?,
        })
    }
}
impl TryFrom<EntryRow> for (InfoHash, BackupEntry) {
    type Error = Error;
    fn try_from(row: EntryRow) -> Result<Self> {
        let hash = InfoHash::from_bytes(&row.info_hash).or_raise(|| ErrorKind::InvalidData("info hash"))?;
        let entry = BackupEntry::new(path_from_bytes(&row.path), nanos_to_datetime(row.modified_at)?);
        Ok((hash, entry))
    }
}

pub(crate) fn datetime_to_nanos(when: OffsetDateTime) -> Result<i64> {
    i64::try_from(when.unix_timestamp_nanos()).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn nanos_to_datetime(nanos: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;
    use time::macros::datetime;

    #[test]
    fn test_row_to_model() {
        let hash = InfoHash::digest(b"de");
        let row = EntryRow {
            info_hash: hash.as_bytes().to_vec(),
            path: b"/backups/2024-01-01/torrents/x.torrent".to_vec(),
            modified_at: 1_700_000_000_123_456_789,
        };
        let (parsed, entry) = <(InfoHash, BackupEntry)>::try_from(row).unwrap();
        assert_eq!(parsed, hash);
        assert_eq!(entry.path, PathBuf::from("/backups/2024-01-01/torrents/x.torrent"));
        // Nanoseconds survive, unlike a seconds-based timestamp.
        assert_eq!(entry.modified.nanosecond(), 123_456_789);
    }

    #[rstest]
    #[case(datetime!(1970-01-01 00:00 UTC), 0)]
    #[case(datetime!(2024-01-01 00:00 UTC), 1_704_067_200_000_000_000)]
    #[case(datetime!(1969-12-31 23:59:59 UTC), -1_000_000_000)]
    fn test_model_to_row(#[case] modified: OffsetDateTime, #[case] nanos: i64) {
        let hash = InfoHash::digest(b"de");
        let entry = BackupEntry::new("/b/torrents/x.torrent", modified);
        let row = EntryRow::try_from((&hash, &entry)).unwrap();
        assert_eq!(row.info_hash.len(), InfoHash::LEN);
        assert_eq!(row.path, b"/b/torrents/x.torrent".to_vec());
        assert_eq!(row.modified_at, nanos);
        assert_eq!(nanos_to_datetime(nanos).unwrap(), modified);
    }

    #[rstest]
    #[case(datetime!(2300-01-01 00:00 UTC))]
    #[case(datetime!(1600-01-01 00:00 UTC))]
    fn test_timestamp_out_of_range(#[case] modified: OffsetDateTime) {
        let err = datetime_to_nanos(modified).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("timestamp")));
    }

    #[test]
    fn test_bad_hash_is_invalid_data() {
        let row = EntryRow { info_hash: vec![1, 2, 3], path: b"x".to_vec(), modified_at: 0 };
        let err = <(InfoHash, BackupEntry)>::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("info hash")));
    }
}
