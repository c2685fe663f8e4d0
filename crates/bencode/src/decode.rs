use crate::error::{ErrorKind, Result};
use crate::{Dict, MAX_DEPTH, Value};

/// Cursor over a bencoded buffer.
///
/// Parsing is strict: anything that would not re-encode to the exact same
/// bytes (leading zeros, `-0`, explicit `+`) is rejected, which is what makes
/// decode-then-encode byte-identical for every document that decodes.
struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, depth: 0 }
    }

    fn peek(&self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(b) => Ok(*b),
            None => exn::bail!(ErrorKind::UnexpectedEof { offset: self.pos }),
        }
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.data.len() {
            exn::bail!(ErrorKind::TrailingData { offset: self.pos });
        }
        Ok(())
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek()? {
            b'i' => self.integer().map(Value::Int),
            b'l' => {
                self.descend()?;
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b'e' {
                    items.push(self.value()?);
                }
                self.pos += 1;
                self.depth -= 1;
                Ok(Value::List(items))
            },
            b'd' => {
                self.descend()?;
                self.pos += 1;
                let mut entries = Vec::new();
                while self.peek()? != b'e' {
                    let key = self.key()?.to_vec();
                    entries.push((key, self.value()?));
                }
                self.pos += 1;
                self.depth -= 1;
                Ok(Value::Dict(entries.into_iter().collect::<Dict>()))
            },
            b'0'..=b'9' => self.bytes().map(|b| Value::Bytes(b.to_vec())),
            byte => exn::bail!(ErrorKind::InvalidPrefix { offset: self.pos, byte }),
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            exn::bail!(ErrorKind::TooDeep { offset: self.pos });
        }
        Ok(())
    }

    fn key(&mut self) -> Result<&'a [u8]> {
        if !self.peek()?.is_ascii_digit() {
            exn::bail!(ErrorKind::InvalidDictKey { offset: self.pos });
        }
        self.bytes()
    }

    fn integer(&mut self) -> Result<i64> {
        let start = self.pos;
        // Skip the `i`.
        self.pos += 1;
        let end = match self.data[self.pos..].iter().position(|b| *b == b'e') {
            Some(len) => self.pos + len,
            None => exn::bail!(ErrorKind::UnexpectedEof { offset: self.data.len() }),
        };
        let digits = &self.data[self.pos..end];
        let magnitude = digits.strip_prefix(b"-").unwrap_or(digits);
        let canonical = !magnitude.is_empty()
            && magnitude.iter().all(u8::is_ascii_digit)
            && (magnitude == b"0" || magnitude[0] != b'0')
            && digits != b"-0";
        if !canonical {
            exn::bail!(ErrorKind::InvalidInteger { offset: start });
        }
        // Only ASCII digits and an optional minus sign remain.
        let value = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidInteger { offset: start }))?;
        self.pos = end + 1;
        Ok(value)
    }

    fn bytes(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let colon = match self.data[self.pos..].iter().position(|b| !b.is_ascii_digit()) {
            Some(len) => self.pos + len,
            None => exn::bail!(ErrorKind::UnexpectedEof { offset: self.data.len() }),
        };
        let digits = &self.data[self.pos..colon];
        if self.data[colon] != b':' || digits.is_empty() || (digits.len() > 1 && digits[0] == b'0') {
            exn::bail!(ErrorKind::InvalidLength { offset: start });
        }
        let len = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidLength { offset: start }))?;
        let begin = colon + 1;
        let end = match begin.checked_add(len) {
            Some(end) if end <= self.data.len() => end,
            _ => exn::bail!(ErrorKind::InvalidLength { offset: start }),
        };
        self.pos = end;
        Ok(&self.data[begin..end])
    }
}

/// Decode a complete document.
///
/// The whole input must be consumed by exactly one value.
pub fn decode(data: impl AsRef<[u8]>) -> Result<Value> {
    let mut decoder = Decoder::new(data.as_ref());
    let value = decoder.value()?;
    decoder.finish()?;
    Ok(value)
}

/// Cheap corruption test: does the document decode at all?
pub fn is_valid(data: impl AsRef<[u8]>) -> bool {
    decode(data).is_ok()
}

/// Return the raw encoded bytes of the value stored under `key` in a
/// top-level dictionary, exactly as they appear in `data`.
///
/// Torrent identifiers are a digest over the original bytes of the `info`
/// value, so they must be hashed as found rather than re-encoded. The whole
/// document is still validated.
pub fn raw_value<'a>(data: &'a [u8], key: impl AsRef<[u8]>) -> Result<Option<&'a [u8]>> {
    let key = key.as_ref();
    let mut decoder = Decoder::new(data);
    if decoder.peek()? != b'd' {
        exn::bail!(ErrorKind::NotADictionary);
    }
    decoder.pos += 1;
    decoder.depth += 1;
    let mut found = None;
    while decoder.peek()? != b'e' {
        let current = decoder.key()?;
        let start = decoder.pos;
        decoder.value()?;
        if found.is_none() && current == key {
            found = Some(&data[start..decoder.pos]);
        }
    }
    decoder.pos += 1;
    decoder.finish()?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"i42e", Value::Int(42))]
    #[case(b"i-7e", Value::Int(-7))]
    #[case(b"i0e", Value::Int(0))]
    #[case(b"4:spam", Value::from("spam"))]
    #[case(b"0:", Value::from(""))]
    #[case(b"le", Value::List(vec![]))]
    #[case(b"l4:spami1ee", Value::List(vec![Value::from("spam"), Value::Int(1)]))]
    fn test_decode_scalars_and_lists(#[case] input: &[u8], #[case] expected: Value) {
        assert_eq!(decode(input).unwrap(), expected);
    }

    #[test]
    fn test_decode_dict_keeps_order() {
        let value = decode(b"d4:spam4:eggs3:cow3:mooe").unwrap();
        let dict = value.as_dict().unwrap();
        let keys: Vec<_> = dict.iter().map(|(k, _)| k.to_vec()).collect();
        assert_eq!(keys, vec![b"spam".to_vec(), b"cow".to_vec()]);
        assert_eq!(dict.get("cow"), Some(&Value::from("moo")));
    }

    #[rstest]
    #[case::empty(b"")]
    #[case::bad_prefix(b"x")]
    #[case::leading_zero_int(b"i01e")]
    #[case::negative_zero(b"i-0e")]
    #[case::plus_sign(b"i+5e")]
    #[case::empty_int(b"ie")]
    #[case::unterminated_int(b"i42")]
    #[case::int_overflow(b"i99999999999999999999e")]
    #[case::leading_zero_len(b"03:abc")]
    #[case::short_string(b"5:abc")]
    #[case::missing_colon(b"3abc")]
    #[case::unterminated_list(b"l4:spam")]
    #[case::int_key(b"di1e1:ae")]
    #[case::trailing(b"i1ei2e")]
    #[case::truncated_torrent(b"d8:announce3:url4:infod4:name")]
    fn test_decode_rejects(#[case] input: &[u8]) {
        assert!(decode(input).is_err());
        assert!(!is_valid(input));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(*decode(b"i1ee").unwrap_err(), ErrorKind::TrailingData { offset: 3 });
        assert_eq!(*decode(b"di1e1:ae").unwrap_err(), ErrorKind::InvalidDictKey { offset: 1 });
        assert_eq!(*decode(b"q").unwrap_err(), ErrorKind::InvalidPrefix { offset: 0, byte: b'q' });
    }

    #[test]
    fn test_depth_limit() {
        let mut deep = vec![b'l'; MAX_DEPTH + 1];
        deep.extend(std::iter::repeat_n(b'e', MAX_DEPTH + 1));
        assert!(matches!(*decode(&deep).unwrap_err(), ErrorKind::TooDeep { .. }));
        let mut ok = vec![b'l'; MAX_DEPTH];
        ok.extend(std::iter::repeat_n(b'e', MAX_DEPTH));
        assert!(decode(&ok).is_ok());
    }

    #[test]
    fn test_raw_value() {
        let data = b"d8:announce3:url4:infod4:name1:x6:lengthi3eee";
        assert_eq!(raw_value(data, "info").unwrap(), Some(&b"d4:name1:x6:lengthi3ee"[..]));
        assert_eq!(raw_value(data, "announce").unwrap(), Some(&b"3:url"[..]));
        assert_eq!(raw_value(data, "missing").unwrap(), None);
    }

    #[test]
    fn test_raw_value_validates_document() {
        assert_eq!(*raw_value(b"li1ee", "info").unwrap_err(), ErrorKind::NotADictionary);
        assert!(raw_value(b"d4:infoi1ee trailing", "info").is_err());
        assert!(raw_value(b"d4:infoi1e", "info").is_err());
    }
}
