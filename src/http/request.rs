use crate::{
    config::{HostFilter, HostPolicy},
    errors::ParseError,
    http::{
        percent,
        query::Query,
        types::{self, Header, Parameter},
    },
    limits::ReqLimits,
    Method, Version,
};
use memchr::{memchr, memmem};
use std::mem;
use tracing::{debug, trace};

/// HTTP request parsed from a connection.
///
/// Everything is owned: the request outlives the buffer it was parsed from.
///
/// # Input data requirements
///
/// #### General designations
/// - `SP`: ASCII space (0x20)
/// - `CRLF`: Carriage return + line feed (`"\r\n"`) - **exactly this sequence required**
///
/// ## First line
///
/// ```text
/// [METHOD] SP [PATH] ["?" QUERY] [SP "HTTP/1." ("0" | "1")] CRLF
/// ```
///
/// - `[METHOD]`: see [Method](crate::Method). Anything else closes the connection.
/// - `[PATH]`: starts with `/` (or is exactly `*`). Kept raw: it is **not**
///   percent-decoded, so an encoded `%2F` never creates an extra segment.
/// - `[QUERY]`: `&`-separated `key=value` pairs, percent-decoded, see
///   [Query](crate::query::Query).
/// - A missing version token is read as HTTP/1.0.
///
/// ## Header
///
/// ```text
/// [NAME] ":" [OWS] [VALUE] CRLF
/// ```
///
/// Names are lowercased. Leading spaces and tabs of the value are dropped,
/// the rest is kept verbatim (including trailing whitespace). A line without
/// a colon is refused. The head must be valid `UTF-8`.
///
/// ## Body
///
/// Only bodies with an explicit `Content-Length` are read; the body is exactly
/// that many bytes. Without the header the body is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    version: Version,

    headers: Vec<Header>,
    parameters: Vec<Parameter>,
    pub(crate) path_params: Vec<String>,

    content_length: Option<usize>,
    body: Vec<u8>,
}

impl Request {
    #[inline]
    pub(crate) fn empty() -> Self {
        Request {
            method: Method::Get,
            path: String::new(),
            version: Version::Http10,

            headers: Vec::new(),
            parameters: Vec::new(),
            path_params: Vec::new(),

            content_length: None,
            body: Vec::new(),
        }
    }
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Raw request path, without the query string.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// All header fields in order of arrival. Names are lowercase.
    #[inline(always)]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Returns the first header value with case-insensitive name matching.
    /// Uses linear search.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Decoded query parameters in order of appearance, duplicates included.
    #[inline(always)]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Value of the first query parameter called `name`.
    #[inline]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Segments captured by the `?` placeholders of the matched route, raw.
    #[inline(always)]
    pub fn path_params(&self) -> &[String] {
        &self.path_params
    }

    #[inline]
    pub fn path_param(&self, index: usize) -> Option<&str> {
        self.path_params.get(index).map(String::as_str)
    }

    /// Percent-decoded copy of [`path_param`](Self::path_param).
    #[inline]
    pub fn path_param_decoded(&self, index: usize) -> Option<String> {
        self.path_param(index).map(percent::decode)
    }

    /// Returns the value of the `Content-Length` header if present.
    #[inline(always)]
    pub const fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Request body, exactly `Content-Length` bytes long.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Request body as text, if it is valid `UTF-8`.
    #[inline]
    pub fn body_str(&self) -> Option<&str> {
        simdutf8::basic::from_utf8(&self.body).ok()
    }

    /// Deserializes the body as JSON.
    #[cfg(feature = "json")]
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

//

/// Result of feeding bytes to a [`Parser`].
#[derive(Debug, PartialEq)]
pub enum Parsed {
    /// The request is incomplete, feed more bytes.
    Continue,
    /// The request is complete. Any bytes after the body are discarded.
    Complete(Request),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    RequestLine,
    Headers,
    Body(usize),
    Complete,
    Failed,
}

/// Incremental request parser owning one connection's accumulation buffer.
///
/// Bytes may be delivered in chunks of any size; the result does not depend
/// on where the chunks are split.
///
/// ```
/// use simplehttp::{Method, Parsed, Parser, limits::ReqLimits};
///
/// let mut parser = Parser::new(&ReqLimits::default());
///
/// assert_eq!(parser.feed(b"POST /lamp?on=1 HT").unwrap(), Parsed::Continue);
/// assert_eq!(parser.feed(b"TP/1.1\r\nContent-Length: 2\r\n\r\n").unwrap(), Parsed::Continue);
///
/// let Parsed::Complete(request) = parser.feed(b"okEXTRA").unwrap() else {
///     panic!("request is complete");
/// };
/// assert_eq!(request.method(), Method::Post);
/// assert_eq!(request.parameter("on"), Some("1"));
/// assert_eq!(request.body(), b"ok");
/// ```
#[derive(Debug)]
pub struct Parser {
    buffer: Vec<u8>,
    // Bytes at the front of `buffer` already turned into `request`
    consumed: usize,
    phase: Phase,
    request: Request,

    max_body_size: usize,
    max_line_size: usize,
    max_headers: usize,
    host: Option<HostFilter>,
}

impl Parser {
    #[inline]
    pub fn new(limits: &ReqLimits) -> Self {
        Parser {
            buffer: Vec::with_capacity(limits.recv_buffer_size),
            consumed: 0,
            phase: Phase::RequestLine,
            request: Request::empty(),

            max_body_size: limits.max_body_size,
            max_line_size: limits.max_line_size,
            max_headers: limits.max_headers,
            host: None,
        }
    }

    #[inline]
    pub(crate) fn with_host_filter(mut self, host: Option<HostFilter>) -> Self {
        self.host = host;
        self
    }

    /// Appends `bytes` to the buffer and parses as far as possible.
    ///
    /// After [`Parsed::Complete`] or an error the parser is finished and
    /// every further call returns [`ParseError::Finished`].
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Parsed, ParseError> {
        if matches!(self.phase, Phase::Complete | Phase::Failed) {
            return Err(ParseError::Finished);
        }

        self.buffer.extend_from_slice(bytes);

        let result = self.advance();
        if result.is_err() {
            self.phase = Phase::Failed;
            self.buffer = Vec::new();
            self.consumed = 0;
        }
        result
    }

    /// Number of bytes held and not yet consumed.
    #[inline]
    pub fn pending(&self) -> usize {
        self.buffer.len() - self.consumed
    }

    fn advance(&mut self) -> Result<Parsed, ParseError> {
        loop {
            match self.phase {
                Phase::RequestLine => {
                    if !self.parse_request_line()? {
                        return Ok(Parsed::Continue);
                    }
                    self.front_trim();
                }
                Phase::Headers => {
                    if !self.parse_header_line()? {
                        return Ok(Parsed::Continue);
                    }
                }
                Phase::Body(expected) => {
                    if self.pending() < expected {
                        return Ok(Parsed::Continue);
                    }
                    return Ok(Parsed::Complete(self.complete(expected)));
                }
                Phase::Complete | Phase::Failed => return Err(ParseError::Finished),
            }
        }
    }

    #[inline]
    fn front_trim(&mut self) {
        self.buffer.drain(..self.consumed);
        self.consumed = 0;
    }

    fn complete(&mut self, expected: usize) -> Request {
        self.front_trim();

        let trailing = self.buffer.len() - expected;
        if trailing > 0 {
            trace!(trailing, "discarding bytes after the request body");
        }

        let body = match expected {
            0 => Vec::new(),
            _ => {
                let mut body = mem::take(&mut self.buffer);
                body.truncate(expected);
                body
            }
        };

        self.phase = Phase::Complete;
        self.buffer = Vec::new();
        self.consumed = 0;

        let mut request = mem::replace(&mut self.request, Request::empty());
        request.body = body;
        request
    }
}

// Parse first line
impl Parser {
    /// Returns `Ok(false)` while the line is incomplete.
    fn parse_request_line(&mut self) -> Result<bool, ParseError> {
        let pending = &self.buffer[self.consumed..];

        let (method, method_len) = match Method::from_prefix(pending) {
            Ok(Some(found)) => found,
            Ok(None) => return Ok(false),
            Err(()) => return Err(ParseError::InvalidMethod),
        };

        let Some(end) = find_crlf(pending) else {
            if pending.len() > self.max_line_size {
                return Err(ParseError::UriTooLong(self.max_line_size));
            }
            return Ok(false);
        };
        if end > self.max_line_size {
            return Err(ParseError::UriTooLong(self.max_line_size));
        }

        let line = simdutf8::basic::from_utf8(&pending[method_len..end])
            .map_err(|_| ParseError::InvalidEncoding)?;

        let (target, version) = match line.split_once(' ') {
            Some((target, version)) => (
                target,
                Version::from_bytes(version.as_bytes()).ok_or(ParseError::UnsupportedVersion)?,
            ),
            None => (line, Version::Http10),
        };

        let (path, query) = match memchr(b'?', target.as_bytes()) {
            Some(pos) => (&target[..pos], Some(&target[pos + 1..])),
            None => (target, None),
        };

        if !(path.starts_with('/') || path == "*") {
            return Err(ParseError::InvalidRequestLine);
        }

        self.request.method = method;
        self.request.path = path.to_string();
        self.request.version = version;
        if let Some(query) = query {
            Query::parse_into(&mut self.request.parameters, query.as_bytes());
        }

        trace!(%method, path, "request line parsed");

        self.consumed += end + 2;
        self.phase = Phase::Headers;
        Ok(true)
    }
}

// Parse headers
impl Parser {
    /// Parses one header line, or the blank line closing the block.
    ///
    /// Returns `Ok(false)` while the line is incomplete.
    fn parse_header_line(&mut self) -> Result<bool, ParseError> {
        let pending = &self.buffer[self.consumed..];

        let Some(end) = find_crlf(pending) else {
            if pending.len() > self.max_line_size {
                return Err(ParseError::HeaderTooLarge(self.max_line_size));
            }
            return Ok(false);
        };
        if end > self.max_line_size {
            return Err(ParseError::HeaderTooLarge(self.max_line_size));
        }

        if end == 0 {
            self.consumed += 2;
            self.front_trim();
            self.phase = Phase::Body(self.request.content_length.unwrap_or(0));
            return Ok(true);
        }

        if self.request.headers.len() >= self.max_headers {
            return Err(ParseError::TooManyHeaders(self.max_headers));
        }

        let header = split_header(&pending[..end])?;
        self.consumed += end + 2;

        match header.name.as_str() {
            "content-length" => {
                let len = types::slice_to_usize(header.value.trim_end().as_bytes())
                    .ok_or(ParseError::InvalidContentLength)?;

                if len > self.max_body_size {
                    return Err(ParseError::BodyTooLarge {
                        declared: len,
                        limit: self.max_body_size,
                    });
                }

                match self.request.content_length {
                    Some(previous) if previous != len => {
                        return Err(ParseError::InvalidContentLength)
                    }
                    _ => self.request.content_length = Some(len),
                }
            }
            "host" => self.check_host(&header.value)?,
            _ => {}
        }

        self.request.headers.push(header);
        Ok(true)
    }

    fn check_host(&self, value: &str) -> Result<(), ParseError> {
        let Some(filter) = &self.host else {
            return Ok(());
        };

        if filter.matches(value) {
            return Ok(());
        }

        match filter.policy {
            HostPolicy::Enforce => Err(ParseError::HostMismatch(value.to_string())),
            HostPolicy::Advisory => {
                debug!(host = value, expected = &*filter.name, "request for another host");
                Ok(())
            }
        }
    }
}

#[inline]
fn find_crlf(src: &[u8]) -> Option<usize> {
    memmem::find(src, b"\r\n")
}

fn split_header(line: &[u8]) -> Result<Header, ParseError> {
    let colon = memchr(b':', line).ok_or(ParseError::InvalidHeader)?;

    let name = &line[..colon];
    if name.is_empty() || name.iter().any(|b| matches!(b, b' ' | b'\t')) {
        return Err(ParseError::InvalidHeader);
    }

    let value = &line[colon + 1..];
    let skip = value
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t'))
        .unwrap_or(value.len());

    let mut name = name.to_vec();
    types::to_lower_case(&mut name);

    let name = String::from_utf8(name).map_err(|_| ParseError::InvalidEncoding)?;
    let value = simdutf8::basic::from_utf8(&value[skip..])
        .map_err(|_| ParseError::InvalidEncoding)?
        .to_string();

    Ok(Header { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    fn parser() -> Parser {
        Parser::new(&ReqLimits::default())
    }

    fn complete(result: Result<Parsed, ParseError>) -> Request {
        match result {
            Ok(Parsed::Complete(request)) => request,
            other => panic!("expected a complete request, got {other:?}"),
        }
    }

    #[test]
    fn method() {
        #[rustfmt::skip]
        let cases = [
            ("GET /url HTTP/1.1\r\n\r\n",       Ok(Method::Get)),
            ("PUT /url HTTP/1.1\r\n\r\n",       Ok(Method::Put)),
            ("POST /url HTTP/1.1\r\n\r\n",      Ok(Method::Post)),
            ("HEAD /url HTTP/1.1\r\n\r\n",      Ok(Method::Head)),
            ("PATCH /url HTTP/1.1\r\n\r\n",     Ok(Method::Patch)),
            ("DELETE /url HTTP/1.1\r\n\r\n",    Ok(Method::Delete)),
            ("OPTIONS /url HTTP/1.1\r\n\r\n",   Ok(Method::Options)),

            (" GET /url HTTP/1.1\r\n\r\n",      Err(ParseError::InvalidMethod)),
            ("PYU /url HTTP/1.1\r\n\r\n",       Err(ParseError::InvalidMethod)),
            ("GETGETGET /url HTTP/1.1\r\n\r\n", Err(ParseError::InvalidMethod)),
            ("get /url HTTP/1.1\r\n\r\n",       Err(ParseError::InvalidMethod)),
            ("GET\r\n\r\n",                     Err(ParseError::InvalidMethod)),
        ];

        for (src, expected) in cases {
            let result = parser().feed(src.as_bytes());
            match expected {
                Ok(method) => assert_eq!(complete(result).method(), method),
                Err(e) => assert_eq!(result, Err(e), "{src}"),
            }
        }
    }

    #[test]
    fn unknown_method_fails_early() {
        let mut p = parser();
        assert_eq!(p.feed(b"BREW"), Err(ParseError::InvalidMethod));
        assert_eq!(p.feed(b" /pot HTTP/1.1\r\n\r\n"), Err(ParseError::Finished));

        let mut p = parser();
        assert_eq!(p.feed(b"PO"), Ok(Parsed::Continue));
        assert_eq!(p.feed(b"ST"), Ok(Parsed::Continue));
        assert_eq!(p.feed(b" /"), Ok(Parsed::Continue));
    }

    #[test]
    fn target() {
        #[rustfmt::skip]
        let cases = [
            ("/",                       Ok(("/", vec![]))),
            ("/?",                      Ok(("/", vec![]))),
            ("*",                       Ok(("*", vec![]))),
            ("/api/find?user=qwe&id=2", Ok(("/api/find", vec![("user", "qwe"), ("id", "2")]))),
            ("/?a=1&a=2",               Ok(("/", vec![("a", "1"), ("a", "2")]))),
            ("/?debug&name=&=Qwe",      Ok(("/", vec![("debug", ""), ("name", ""), ("", "Qwe")]))),
            ("/s?q=lamp+on%21",         Ok(("/s", vec![("q", "lamp on!")]))),
            ("/a%2Fb",                  Ok(("/a%2Fb", vec![]))),
            ("/api/users/",             Ok(("/api/users/", vec![]))),

            ("qwe",                     Err(ParseError::InvalidRequestLine)),
            ("",                        Err(ParseError::InvalidRequestLine)),
            ("?a=1",                    Err(ParseError::InvalidRequestLine)),
            ("http://host/x",           Err(ParseError::InvalidRequestLine)),
        ];

        for (target, expected) in cases {
            let src = format!("GET {target} HTTP/1.1\r\n\r\n");
            let result = parser().feed(src.as_bytes());

            match expected {
                Ok((path, params)) => {
                    let request = complete(result);
                    assert_eq!(request.path(), path, "{target}");

                    let got: Vec<_> = request
                        .parameters()
                        .iter()
                        .map(|p| (p.name.as_str(), p.value.as_str()))
                        .collect();
                    assert_eq!(got, params, "{target}");
                }
                Err(e) => assert_eq!(result, Err(e), "{target}"),
            }
        }
    }

    #[test]
    fn version() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n",   Ok(Version::Http11)),
            ("GET / HTTP/1.0\r\n\r\n",   Ok(Version::Http10)),
            ("GET /\r\n\r\n",            Ok(Version::Http10)),

            ("GET / HTTP/1.0 \r\n\r\n",  Err(ParseError::UnsupportedVersion)),
            ("GET / HTTP/2.0\r\n\r\n",   Err(ParseError::UnsupportedVersion)),
            ("GET / http/1.1\r\n\r\n",   Err(ParseError::UnsupportedVersion)),
            ("GET / \r\n\r\n",           Err(ParseError::UnsupportedVersion)),
            ("GET / HTTP/1.15\r\n\r\n",  Err(ParseError::UnsupportedVersion)),
        ];

        for (src, expected) in cases {
            let result = parser().feed(src.as_bytes());
            match expected {
                Ok(version) => assert_eq!(complete(result).version(), version),
                Err(e) => assert_eq!(result, Err(e), "{src}"),
            }
        }
    }

    #[test]
    fn header() {
        #[rustfmt::skip]
        let cases = [
            ("HEADER: value",         Ok(("header", "value"))),
            ("Header: value",         Ok(("header", "value"))),
            ("header:value",          Ok(("header", "value"))),
            ("header:   value  ",     Ok(("header", "value  "))),
            ("header:\t\tvalue",      Ok(("header", "value"))),
            ("header: ",              Ok(("header", ""))),
            ("header:",               Ok(("header", ""))),
            ("X-Time: 12:30",         Ok(("x-time", "12:30"))),

            ("header value",          Err(ParseError::InvalidHeader)),
            (": value",               Err(ParseError::InvalidHeader)),
            ("bad header: value",     Err(ParseError::InvalidHeader)),
            ("header : value",        Err(ParseError::InvalidHeader)),
        ];

        for (line, expected) in cases {
            let src = format!("GET / HTTP/1.1\r\n{line}\r\n\r\n");
            let result = parser().feed(src.as_bytes());

            match expected {
                Ok((name, value)) => {
                    let request = complete(result);
                    assert_eq!(request.headers().len(), 1);
                    assert_eq!(str_field(&request.headers()[0]), (name, value), "{line}");
                    assert_eq!(request.header(&name.to_uppercase()), Some(value));
                }
                Err(e) => assert_eq!(result, Err(e), "{line}"),
            }
        }
    }

    #[test]
    fn duplicate_headers_keep_order() {
        let src = "GET / HTTP/1.1\r\nAccept: a\r\nX: 1\r\naccept: b\r\n\r\n";
        let request = complete(parser().feed(src.as_bytes()));

        let got: Vec<_> = request.headers().iter().map(str_field).collect();
        assert_eq!(got, [("accept", "a"), ("x", "1"), ("accept", "b")]);
        assert_eq!(request.header("accept"), Some("a"));
    }

    #[test]
    fn too_many_headers() {
        let limits = ReqLimits {
            max_headers: 2,
            ..ReqLimits::default()
        };

        let ok = "GET / HTTP/1.1\r\na: 1\r\nb: 2\r\n\r\n";
        assert!(matches!(
            Parser::new(&limits).feed(ok.as_bytes()),
            Ok(Parsed::Complete(_))
        ));

        let too_many = "GET / HTTP/1.1\r\na: 1\r\nb: 2\r\nc: 3\r\n\r\n";
        assert_eq!(
            Parser::new(&limits).feed(too_many.as_bytes()),
            Err(ParseError::TooManyHeaders(2))
        );
    }

    #[test]
    fn body() {
        #[rustfmt::skip]
        let cases = [
            ("Content-Length: 5\r\n\r\nhello",          Ok(&b"hello"[..])),
            ("Content-Length: 5\r\n\r\nhello world",    Ok(&b"hello"[..])),
            ("Content-Length: 0\r\n\r\nignored",        Ok(&b""[..])),
            ("\r\nno length",                           Ok(&b""[..])),
            ("Content-Length: 3 \r\n\r\n\x00\x01\x02",  Ok(&b"\x00\x01\x02"[..])),
            ("Content-Length: 4096\r\n\r\n",            Err(None)),

            ("Content-Length: 4097\r\n\r\n",
                Err(Some(ParseError::BodyTooLarge { declared: 4097, limit: 4096 }))),
            ("Content-Length: abc\r\n\r\n",             Err(Some(ParseError::InvalidContentLength))),
            ("Content-Length: -1\r\n\r\n",              Err(Some(ParseError::InvalidContentLength))),
            ("Content-Length:\r\n\r\n",                 Err(Some(ParseError::InvalidContentLength))),
            ("Content-Length: 2\r\nContent-Length: 3\r\n\r\n",
                Err(Some(ParseError::InvalidContentLength))),
        ];

        for (rest, expected) in cases {
            let src = format!("POST /lamp HTTP/1.1\r\n{rest}");
            let result = parser().feed(src.as_bytes());

            match expected {
                Ok(body) => {
                    let request = complete(result);
                    assert_eq!(request.body(), body, "{rest:?}");
                    assert_eq!(request.body().len(), request.content_length().unwrap_or(0));
                }
                // Waits for the rest of the body
                Err(None) => assert_eq!(result, Ok(Parsed::Continue), "{rest:?}"),
                Err(Some(e)) => assert_eq!(result, Err(e), "{rest:?}"),
            }
        }
    }

    #[test]
    fn body_too_large_before_body_arrives() {
        let limits = ReqLimits {
            max_body_size: 10,
            ..ReqLimits::default()
        };
        let mut p = Parser::new(&limits);

        assert_eq!(p.feed(b"POST / HTTP/1.1\r\n"), Ok(Parsed::Continue));
        assert_eq!(
            p.feed(b"Content-Length: 11\r\n"),
            Err(ParseError::BodyTooLarge {
                declared: 11,
                limit: 10
            })
        );
        assert_eq!(p.pending(), 0);
        assert_eq!(p.feed(b"\r\n"), Err(ParseError::Finished));
    }

    #[test]
    fn line_limits() {
        let limits = ReqLimits {
            max_line_size: 32,
            ..ReqLimits::default()
        };

        let long_path = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(40));
        assert_eq!(
            Parser::new(&limits).feed(long_path.as_bytes()),
            Err(ParseError::UriTooLong(32))
        );

        // Without a CRLF in sight
        let mut p = Parser::new(&limits);
        assert_eq!(p.feed(b"GET /"), Ok(Parsed::Continue));
        assert_eq!(
            p.feed("b".repeat(40).as_bytes()),
            Err(ParseError::UriTooLong(32))
        );

        let long_header = format!("GET / HTTP/1.1\r\nx: {}\r\n\r\n", "v".repeat(40));
        assert_eq!(
            Parser::new(&limits).feed(long_header.as_bytes()),
            Err(ParseError::HeaderTooLarge(32))
        );
    }

    #[test]
    fn encoding() {
        let mut src = b"GET /caf".to_vec();
        src.extend_from_slice(&[0xC3, 0x28]);
        src.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        assert_eq!(parser().feed(&src), Err(ParseError::InvalidEncoding));

        let mut src = b"GET / HTTP/1.1\r\nx: ".to_vec();
        src.extend_from_slice(&[0xFF]);
        src.extend_from_slice(b"\r\n\r\n");
        assert_eq!(parser().feed(&src), Err(ParseError::InvalidEncoding));

        let request = complete(parser().feed("GET /café HTTP/1.1\r\n\r\n".as_bytes()));
        assert_eq!(request.path(), "/café");
    }

    #[test]
    fn host_filter() {
        let filter = |policy| {
            Some(HostFilter {
                name: "lamp.local".into(),
                policy,
            })
        };

        #[rustfmt::skip]
        let cases = [
            (HostPolicy::Enforce,  "Host: lamp.local\r\n",     Ok(())),
            (HostPolicy::Enforce,  "Host: LAMP.LOCAL:80\r\n",  Ok(())),
            (HostPolicy::Enforce,  "",                         Ok(())),
            (HostPolicy::Enforce,  "Host: evil.local\r\n",
                Err(ParseError::HostMismatch("evil.local".into()))),
            (HostPolicy::Advisory, "Host: evil.local\r\n",     Ok(())),
        ];

        for (policy, host, expected) in cases {
            let src = format!("GET / HTTP/1.1\r\n{host}\r\n");
            let result = parser().with_host_filter(filter(policy)).feed(src.as_bytes());

            match expected {
                Ok(()) => drop(complete(result)),
                Err(e) => assert_eq!(result, Err(e)),
            }
        }
    }

    #[test]
    fn finished_after_complete() {
        let mut p = parser();
        complete(p.feed(b"GET / HTTP/1.1\r\n\r\n"));
        assert_eq!(p.feed(b"GET / HTTP/1.1\r\n\r\n"), Err(ParseError::Finished));
    }

    #[test]
    fn front_trim() {
        let mut p = parser();

        assert_eq!(p.feed(b"GET /lamp HTTP/1.1\r\nHost: lamp"), Ok(Parsed::Continue));
        // Request line is gone, the partial header stays
        assert_eq!(p.pending(), b"Host: lamp".len());
        assert_eq!(p.buffer.len(), b"Host: lamp".len());

        assert_eq!(p.feed(b".local\r\nContent-Length: 3\r\n\r\nab"), Ok(Parsed::Continue));
        assert_eq!(p.buffer, b"ab");

        let request = complete(p.feed(b"c"));
        assert_eq!(request.body(), b"abc");
        assert_eq!(request.header("host"), Some("lamp.local"));
    }

    const FULL: &str = "PATCH /users/42/posts/7?sort=new+first&tag=%23lamp&flag HTTP/1.1\r\n\
        Host: lamp.local\r\n\
        Content-Type: application/json\r\n\
        X-Empty:\r\n\
        Content-Length: 11\r\n\
        \r\n\
        {\"on\":true}";

    fn assert_full(request: &Request) {
        assert_eq!(request.method(), Method::Patch);
        assert_eq!(request.path(), "/users/42/posts/7");
        assert_eq!(request.version(), Version::Http11);
        assert_eq!(request.parameter("sort"), Some("new first"));
        assert_eq!(request.parameter("tag"), Some("#lamp"));
        assert_eq!(request.parameter("flag"), Some(""));
        assert_eq!(request.headers().len(), 4);
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("x-empty"), Some(""));
        assert_eq!(request.content_length(), Some(11));
        assert_eq!(request.body_str(), Some("{\"on\":true}"));
    }

    #[test]
    fn any_chunking_gives_the_same_request() {
        let bytes = FULL.as_bytes();
        let whole = complete(parser().feed(bytes));
        assert_full(&whole);

        // Byte by byte
        let mut p = parser();
        for (i, byte) in bytes.iter().enumerate() {
            let result = p.feed(&[*byte]);
            if i + 1 < bytes.len() {
                assert_eq!(result, Ok(Parsed::Continue), "byte {i}");
            } else {
                assert_eq!(complete(result), whole);
            }
        }

        // Every split into two chunks
        for split in 0..=bytes.len() {
            let mut p = parser();
            let first = p.feed(&bytes[..split]);
            let request = match first {
                Ok(Parsed::Complete(request)) => request,
                Ok(Parsed::Continue) => complete(p.feed(&bytes[split..])),
                Err(e) => panic!("split {split}: {e}"),
            };
            assert_eq!(request, whole, "split {split}");
        }

        // Every split into three chunks of a shorter request
        let short = b"GET /a?b=c HTTP/1.0\r\nX: y\r\n\r\n";
        let expected = complete(parser().feed(short));
        for i in 0..=short.len() {
            for j in i..=short.len() {
                let mut p = parser();
                let mut done = None;
                for chunk in [&short[..i], &short[i..j], &short[j..]] {
                    if done.is_none() {
                        if let Parsed::Complete(request) = p.feed(chunk).unwrap() {
                            done = Some(request);
                        }
                    }
                }
                assert_eq!(done.as_ref(), Some(&expected), "{i}/{j}");
            }
        }
    }

    #[test]
    fn path_params_decoded() {
        let mut request = complete(parser().feed(b"GET /files/a%20b HTTP/1.1\r\n\r\n"));
        request.path_params = vec!["a%20b".into()];

        assert_eq!(request.path_param(0), Some("a%20b"));
        assert_eq!(request.path_param_decoded(0).as_deref(), Some("a b"));
        assert_eq!(request.path_param(1), None);
    }
}
