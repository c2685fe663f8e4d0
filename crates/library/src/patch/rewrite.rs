use crate::downloads::{DOWNLOADS_KEY, TORRENT_KEY};
use crate::path_to_bytes;
use crate::recover::{Mappings, RecoveredMapping};
use revive_bencode::Value;
use std::path::Path;

/// Point every download whose `torrent` field exactly matches an applicable
/// mapping at `<torrents_dir>/<file name>`. Returns the number of entries
/// changed.
///
/// Only that one field of matching entries is touched. Everything else,
/// including key order, is left as decoded.
pub fn rewrite(document: &mut Value, mappings: &Mappings, torrents_dir: &Path) -> usize {
    let Some(downloads) = document
        .as_dict_mut()
        .and_then(|dict| dict.get_mut(DOWNLOADS_KEY))
        .and_then(Value::as_list_mut)
    else {
        return 0;
    };
    let mut rewritten = 0;
    for entry in downloads.iter_mut().filter_map(Value::as_dict_mut) {
        let Some(field) = entry.get_mut(TORRENT_KEY) else { continue };
        let Some(mapping) = field.as_bytes().and_then(|path| mappings.get(path)).filter(|m| m.is_applicable()) else {
            continue;
        };
        *field = Value::Bytes(canonical_path(mapping, torrents_dir));
        rewritten += 1;
    }
    rewritten
}

fn canonical_path(mapping: &RecoveredMapping, torrents_dir: &Path) -> Vec<u8> {
    path_to_bytes(&torrents_dir.join(&mapping.file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use revive_bencode::{decode, encode};

    const DOCUMENT: &[u8] = b"d\
        9:downloadsl\
        d8:categoryi1e7:torrent15:/data/a.torrent12:torrent_hash3:abce\
        d7:torrent15:/data/b.torrent6:zorderi2ee\
        i42e\
        d5:stateli1ei2ee7:torrent15:/data/c.torrente\
        e\
        8:settingsd7:torrent15:/data/a.torrentee";

    fn mappings(entries: &[(&str, &str, Option<&str>)]) -> Mappings {
        entries
            .iter()
            .map(|(original, name, error)| {
                let mut mapping = RecoveredMapping::new(*original, *name, "/backup/torrents/x");
                mapping.error = error.map(str::to_string);
                (original.as_bytes().to_vec(), mapping)
            })
            .collect()
    }

    #[test]
    fn test_round_trip_without_mappings() {
        let mut document = decode(DOCUMENT).unwrap();
        assert_eq!(rewrite(&mut document, &Mappings::new(), Path::new("/data/torrents")), 0);
        assert_eq!(encode(&document), DOCUMENT);
    }

    #[test]
    fn test_only_matching_entry_changes() {
        let mut document = decode(DOCUMENT).unwrap();
        let mappings = mappings(&[("/data/b.torrent", "b.torrent", None)]);
        assert_eq!(rewrite(&mut document, &mappings, Path::new("/data/torrents")), 1);
        let expected = String::from_utf8_lossy(DOCUMENT)
            .replace("d7:torrent15:/data/b.torrent", "d7:torrent24:/data/torrents/b.torrent")
            .into_bytes();
        assert_eq!(encode(&document), expected);
    }

    #[test]
    fn test_errored_and_unknown_mappings_are_ignored() {
        let mut document = decode(DOCUMENT).unwrap();
        let mappings = mappings(&[
            ("/data/a.torrent", "a.torrent", Some("copy failed")),
            ("/data/zzz.torrent", "zzz.torrent", None),
        ]);
        assert_eq!(rewrite(&mut document, &mappings, Path::new("/data/torrents")), 0);
        assert_eq!(encode(&document), DOCUMENT);
    }

    #[test]
    fn test_nested_torrent_fields_are_not_touched() {
        // `settings.torrent` matches a mapping key but isn't a download entry.
        let mut document = decode(DOCUMENT).unwrap();
        let mappings = mappings(&[("/data/a.torrent", "a.torrent", None)]);
        assert_eq!(rewrite(&mut document, &mappings, Path::new("/data/torrents")), 1);
        let encoded = encode(&document);
        assert!(encoded.ends_with(b"8:settingsd7:torrent15:/data/a.torrentee"));
    }

    #[test]
    fn test_document_without_downloads() {
        let mut document = decode(b"d5:otheri1ee").unwrap();
        assert_eq!(rewrite(&mut document, &mappings(&[("/x", "x", None)]), Path::new("/t")), 0);
    }
}
