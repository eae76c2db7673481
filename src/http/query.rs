//! URL query string parser.

use crate::{http::percent, Parameter};
use memchr::memchr;

/// Query string splitter with percent-decoding.
///
/// Pieces are separated by `&`; each piece is `key=value`, or a bare `key`
/// whose value is empty. Only the first `=` separates key from value. Empty
/// pieces are skipped. Keys and values are percent-decoded, `+` being a space.
///
/// Also suitable for `application/x-www-form-urlencoded` bodies.
///
/// # Examples
/// ```rust
/// use simplehttp::query::Query;
///
/// let params = Query::parse(b"?name=Desk+lamp&on&&level=50%25");
///
/// assert_eq!(params.len(), 3);
/// assert_eq!((params[0].name.as_str(), params[0].value.as_str()), ("name", "Desk lamp"));
/// assert_eq!((params[1].name.as_str(), params[1].value.as_str()), ("on", ""));
/// assert_eq!((params[2].name.as_str(), params[2].value.as_str()), ("level", "50%"));
/// ```
pub struct Query;

impl Query {
    /// Parses `query` (an optional leading `?` is ignored) into a new list.
    #[inline]
    pub fn parse(query: &[u8]) -> Vec<Parameter> {
        let mut result = Vec::new();
        Self::parse_into(&mut result, query);
        result
    }

    /// Appends the parameters of `query` to `result`, in order of appearance.
    pub fn parse_into(result: &mut Vec<Parameter>, query: &[u8]) {
        let query = match query {
            [b'?', rest @ ..] => rest,
            _ => query,
        };

        for piece in query.split(|b| *b == b'&') {
            if piece.is_empty() {
                continue;
            }

            let (name, value) = match memchr(b'=', piece) {
                Some(pos) => (&piece[..pos], &piece[pos + 1..]),
                None => (piece, &b""[..]),
            };

            result.push(Parameter {
                name: decode_text(name),
                value: decode_text(value),
            });
        }
    }
}

#[inline]
fn decode_text(src: &[u8]) -> String {
    let bytes = percent::decode_bytes(src);
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(params: &[Parameter]) -> Vec<(&str, &str)> {
        params
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
            .collect()
    }

    #[test]
    fn basic() {
        let cases = ["a=1&b=2", "?a=1&b=2", "a=1&b=2&", "&&a=1&&b=2"];

        for line in cases {
            let params = Query::parse(line.as_bytes());
            assert_eq!(pairs(&params), [("a", "1"), ("b", "2")], "{line}");
        }
    }

    #[test]
    fn full() {
        let params = Query::parse(b"flag&empty=&=val&&key=value&eq=a=b");

        assert_eq!(
            pairs(&params),
            [
                ("flag", ""),
                ("empty", ""),
                ("", "val"),
                ("key", "value"),
                ("eq", "a=b")
            ]
        );
    }

    #[test]
    fn decoding() {
        #[rustfmt::skip]
        let cases = [
            ("q=a+b",              ("q", "a b")),
            ("q=a%20b",            ("q", "a b")),
            ("na%6De=x",           ("name", "x")),
            ("q=%26%3D",           ("q", "&=")),
            ("q=100%",             ("q", "100%")),
            ("q=%E2%9C%93",        ("q", "✓")),
            ("q=%FF",              ("q", "\u{FFFD}")),
        ];

        for (line, expected) in cases {
            let params = Query::parse(line.as_bytes());
            assert_eq!(pairs(&params), [expected], "{line}");
        }
    }

    #[test]
    fn duplicates_keep_order() {
        let params = Query::parse(b"a=1&a=2&a=3");
        assert_eq!(pairs(&params), [("a", "1"), ("a", "2"), ("a", "3")]);
    }

    #[test]
    fn empty() {
        assert!(Query::parse(b"").is_empty());
        assert!(Query::parse(b"?").is_empty());
        assert!(Query::parse(b"&&&").is_empty());
    }
}
