//! rsync path escapes
//!
//! rsync prints bytes it considers unsafe for the terminal as `\#ooo`, a
//! backslash and hash followed by three octal digits. A literal backslash
//! that would otherwise read as such a sequence is itself printed as
//! `\#134`.

use regex::bytes::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

static ESCAPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\#([0-7]{3})").expect("Invalid escape regex"));

/// Decode every `\#ooo` sequence into its raw byte.
///
/// Sequences whose value does not fit in a byte are left untouched.
pub fn decode_path(raw: &[u8]) -> Cow<'_, [u8]> {
    ESCAPE_REGEX.replace_all(raw, |caps: &Captures| {
        let digits = &caps[1];
        let value = digits
            .iter()
            .fold(0u32, |acc, &d| acc * 8 + u32::from(d - b'0'));
        match u8::try_from(value) {
            Ok(byte) => vec![byte],
            Err(_) => caps[0].to_vec(),
        }
    })
}

/// Escape a raw path the way rsync prints it
pub fn encode_path(path: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(path.len());
    for (i, &b) in path.iter().enumerate() {
        let ambiguous_backslash = b == b'\\' && path.get(i + 1) == Some(&b'#');
        if ambiguous_backslash || b < 0x20 || b >= 0x7f {
            out.extend_from_slice(format!("\\#{:03o}", b).as_bytes());
        } else {
            out.push(b);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        assert_eq!(decode_path(b"dir/new\\#012line").as_ref(), b"dir/new\nline");
        assert_eq!(decode_path(b"caf\\#303\\#251").as_ref(), "café".as_bytes());
    }

    #[test]
    fn test_decode_without_escapes_borrows() {
        assert!(matches!(decode_path(b"plain/path.txt"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_leaves_non_escapes() {
        // not octal, too short, out of byte range
        assert_eq!(decode_path(b"a\\#089").as_ref(), b"a\\#089");
        assert_eq!(decode_path(b"a\\#01").as_ref(), b"a\\#01");
        assert_eq!(decode_path(b"a\\#777").as_ref(), b"a\\#777");
        assert_eq!(decode_path(b"a\\b#012").as_ref(), b"a\\b#012");
    }

    #[test]
    fn test_decode_is_idempotent_on_decoded_paths() {
        let samples: [&[u8]; 4] = [
            b"a\\#012b",
            b"tab\\#011sep/x",
            b"no escapes at all",
            b"\\#001\\#177",
        ];
        for raw in samples {
            let once = decode_path(raw).into_owned();
            let twice = decode_path(&once).into_owned();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_encode_then_decode_restores_every_byte() {
        let all: Vec<u8> = (0..=255u8).collect();
        let encoded = encode_path(&all);
        assert!(encoded.iter().all(|b| (0x20..0x7f).contains(b)));
        assert_eq!(decode_path(&encoded).as_ref(), all.as_slice());
    }

    #[test]
    fn test_encode_escapes_ambiguous_backslash() {
        let raw = b"odd\\#012name";
        let encoded = encode_path(raw);
        assert_eq!(encoded, b"odd\\#134#012name");
        assert_eq!(decode_path(&encoded).as_ref(), raw);
    }
}
