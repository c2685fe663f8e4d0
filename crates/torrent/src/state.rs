//! Naming conventions of the client's per-download state files.
//!
//! Every in-progress download has a state document in the `active/`
//! directory, named after the upper-case hex info-hash. The client keeps it
//! redundantly: the file itself, a backup copy, and two temporaries that are
//! left behind when a write is interrupted.

use crate::InfoHash;

/// Directory (relative to the client's data directory) holding state files.
pub const STATE_DIRECTORY: &str = "active";

/// One of the four on-disk variants of a state document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateFile {
    /// `<ID>.dat`
    Primary,
    /// `<ID>.dat.bak`
    Backup,
    /// `<ID>.dat._AZ`, written before the primary is replaced.
    WriteAhead,
    /// `<ID>.dat.saving`, the in-flight save.
    Saving,
}

impl StateFile {
    /// All variants, in repair precedence order.
    pub const ALL: [StateFile; 4] = [StateFile::Primary, StateFile::Backup, StateFile::WriteAhead, StateFile::Saving];

    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            StateFile::Primary => ".dat",
            StateFile::Backup => ".dat.bak",
            StateFile::WriteAhead => ".dat._AZ",
            StateFile::Saving => ".dat.saving",
        }
    }

    /// File name of this variant for the identifier `id`.
    #[must_use]
    pub fn file_name(&self, id: &str) -> String {
        format!("{id}{}", self.suffix())
    }

    /// Split a file name into identifier and variant.
    ///
    /// Returns `None` for anything that isn't a state file (or has an empty
    /// identifier).
    pub fn parse(file_name: &str) -> Option<(&str, StateFile)> {
        // Longest suffixes first: every variant's suffix starts with ".dat".
        [StateFile::Saving, StateFile::Backup, StateFile::WriteAhead, StateFile::Primary]
            .into_iter()
            .find_map(|kind| file_name.strip_suffix(kind.suffix()).map(|id| (id, kind)))
            .filter(|(id, _)| !id.is_empty())
    }
}

/// File name of the primary state document for a download.
pub fn state_file_name(hash: &InfoHash) -> String {
    StateFile::Primary.file_name(&hash.to_upper_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ABCDEF.dat", Some(("ABCDEF", StateFile::Primary)))]
    #[case("ABCDEF.dat.bak", Some(("ABCDEF", StateFile::Backup)))]
    #[case("ABCDEF.dat._AZ", Some(("ABCDEF", StateFile::WriteAhead)))]
    #[case("ABCDEF.dat.saving", Some(("ABCDEF", StateFile::Saving)))]
    #[case("ABCDEF.torrent", None)]
    #[case(".dat", None)]
    #[case("ABCDEF.dat.old", None)]
    fn test_parse(#[case] name: &str, #[case] expected: Option<(&str, StateFile)>) {
        assert_eq!(StateFile::parse(name), expected);
    }

    #[test]
    fn test_file_names_round_trip() {
        for kind in StateFile::ALL {
            let name = kind.file_name("0123");
            assert_eq!(StateFile::parse(&name), Some(("0123", kind)));
        }
    }

    #[test]
    fn test_state_file_name_is_upper_hex() {
        let hash = InfoHash::digest(b"de");
        assert_eq!(state_file_name(&hash), "600CCD1B71569232D01D110BC63E906BEAB04D8C.dat");
    }
}
