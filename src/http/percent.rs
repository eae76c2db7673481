//! Percent-encoding of URL components.
//!
//! Pure functions, usable on their own:
//!
//! ```
//! use simplehttp::percent;
//!
//! let encoded = percent::encode("lamp on/off & more");
//! assert_eq!(encoded, "lamp%20on%2Foff%20%26%20more");
//! assert_eq!(percent::decode(&encoded), "lamp on/off & more");
//!
//! // `+` is a space in query strings
//! assert_eq!(percent::decode("a+b%3Dc"), "a b=c");
//! ```
//!
//! Every byte outside the RFC 3986 unreserved set (`A-Z a-z 0-9 - . _ ~`) is
//! escaped, `+` and `%` included, so `decode(encode(s)) == s` holds for any
//! input.

use memchr::memchr2;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[inline(always)]
const fn is_unreserved(byte: u8) -> bool {
    matches!(byte, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

#[inline(always)]
const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Escapes every reserved byte of `src` as `%XX`.
pub fn encode_bytes(src: &[u8]) -> Vec<u8> {
    let escaped = src.iter().filter(|b| !is_unreserved(**b)).count();
    let mut result = Vec::with_capacity(src.len() + escaped * 2);

    for &byte in src {
        if is_unreserved(byte) {
            result.push(byte);
        } else {
            result.extend_from_slice(&[b'%', HEX[(byte >> 4) as usize], HEX[(byte & 0xF) as usize]]);
        }
    }

    result
}

/// Reverses [`encode_bytes`]: `%XX` becomes one byte and `+` becomes a space.
///
/// A `%` not followed by two hex digits is kept as is.
pub fn decode_bytes(src: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(src.len());
    let mut rest = src;

    while let Some(pos) = memchr2(b'%', b'+', rest) {
        result.extend_from_slice(&rest[..pos]);

        match (rest[pos], rest.get(pos + 1..pos + 3)) {
            (b'+', _) => {
                result.push(b' ');
                rest = &rest[pos + 1..];
            }
            (_, Some(&[high, low])) => match (hex_value(high), hex_value(low)) {
                (Some(high), Some(low)) => {
                    result.push(high << 4 | low);
                    rest = &rest[pos + 3..];
                }
                _ => {
                    result.push(b'%');
                    rest = &rest[pos + 1..];
                }
            },
            _ => {
                result.push(b'%');
                rest = &rest[pos + 1..];
            }
        }
    }

    result.extend_from_slice(rest);
    result
}

/// Percent-encodes `src`. The result is plain ASCII.
pub fn encode(src: &str) -> String {
    let bytes = encode_bytes(src.as_bytes());
    // Only ASCII is ever emitted
    bytes.into_iter().map(char::from).collect()
}

/// Percent-decodes `src`.
///
/// Escapes that decode to invalid UTF-8 are replaced with `U+FFFD`; use
/// [`decode_bytes`] to keep the raw bytes.
pub fn decode(src: &str) -> String {
    match String::from_utf8(decode_bytes(src.as_bytes())) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn encode_cases() {
        #[rustfmt::skip]
        let cases = [
            ("",                 ""),
            ("lamp",             "lamp"),
            ("a-b.c_d~e",        "a-b.c_d~e"),
            ("a b",              "a%20b"),
            ("a+b",              "a%2Bb"),
            ("100%",             "100%25"),
            ("/files/?name",     "%2Ffiles%2F%3Fname"),
            ("k=v&x=y",          "k%3Dv%26x%3Dy"),
            (" !\"#$%&'()*,/:;<=>?@[\\]{|}",
             "%20%21%22%23%24%25%26%27%28%29%2A%2C%2F%3A%3B%3C%3D%3E%3F%40%5B%5C%5D%7B%7C%7D"),
            ("ž",                "%C5%BE"),
        ];

        for (src, expected) in cases {
            assert_eq!(encode(src), expected, "{src}");
        }
    }

    #[test]
    fn decode_cases() {
        #[rustfmt::skip]
        let cases: [(&[u8], &[u8]); 12] = [
            (b"",              b""),
            (b"lamp",          b"lamp"),
            (b"a%20b",         b"a b"),
            (b"a+b",           b"a b"),
            (b"%2b",           b"+"),
            (b"%2B%25",        b"+%"),
            (b"%",             b"%"),
            (b"%2",            b"%2"),
            (b"%zz",           b"%zz"),
            (b"%%41",          b"%A"),
            (b"50%+off",       b"50% off"),
            (b"%FF%00",        &[0xFF, 0x00]),
        ];

        for (src, expected) in cases {
            assert_eq!(decode_bytes(src), expected, "{}", str_op(src));
        }

        assert_eq!(decode("%C5%BE"), "ž");
        assert_eq!(decode("%FF"), "\u{FFFD}");
    }

    #[test]
    fn round_trip_all_bytes() {
        for byte in 0..=255u8 {
            let src = [byte];
            let encoded = encode_bytes(&src);
            assert!(encoded.iter().all(|b| is_unreserved(*b) || *b == b'%'));
            assert_eq!(decode_bytes(&encoded), src);
        }

        let every: Vec<u8> = (0..=255u8).chain((0..=255u8).rev()).collect();
        assert_eq!(decode_bytes(&encode_bytes(&every)), every);
    }

    #[test]
    fn round_trip_text() {
        let cases = [
            "",
            "plain",
            "with space",
            "a+b=c&d",
            "%41 is not A",
            "++%%",
            "/users/?/posts/*",
            "brightness: 100%; color=#ff0000",
            "Лампа включена",
            "🫖 tea",
        ];

        for src in cases {
            let encoded = encode(src);
            assert!(!encoded.contains('+'));
            assert!(encoded.is_ascii());
            assert_eq!(decode(&encoded), src);
        }
    }
}
