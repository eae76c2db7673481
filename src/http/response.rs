//! HTTP response value handed back by route handlers.

use crate::{
    errors::WriteFault,
    http::types::{Header, StatusCode},
};
use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
};
use tracing::error;

/// HTTP response returned by a [`Handler`](crate::Handler).
///
/// Holds a status, the headers to send and a [`Body`]. The server writes it
/// exactly once and adds two headers of its own:
/// - `Connection: close`, the connection is never reused;
/// - `Content-Length`, whenever the body length is known up front.
///
/// # Examples
/// ```
/// use simplehttp::{Response, StatusCode};
///
/// let resp = Response::new(StatusCode::Ok)
///     .header("Content-Type", "text/html")
///     .body("<h1>Hello World</h1>");
///
/// assert_eq!(resp.status(), StatusCode::Ok);
/// assert_eq!(resp.body_ref().len(), Some(20));
/// ```
///
/// # Panics
/// [`header`](Response::header) performs validity checks in `debug` mode
/// that panic on violations. In `release` mode, these checks are omitted,
/// which may produce invalid HTTP responses.
pub struct Response {
    status: StatusCode,
    headers: Vec<Header>,
    body: Body,
}

/// Body of a [`Response`]
pub enum Body {
    /// Bytes held in memory, sent in one write.
    Buffered(Vec<u8>),
    /// Bytes produced on demand, see [`StreamBody`].
    Stream(StreamBody),
}

impl Body {
    /// Length of the body when it is known before sending.
    #[inline]
    pub fn len(&self) -> Option<u64> {
        match self {
            Body::Buffered(bytes) => Some(bytes.len() as u64),
            Body::Stream(stream) => stream.length,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Body::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
        }
    }
}

type Generator = Box<dyn FnMut(u64) -> Option<Vec<u8>> + Send>;
type Cleanup = Box<dyn FnOnce() + Send>;

/// Pull-based body: a generator called until it runs dry, then a cleanup action.
///
/// The generator receives the number of body bytes sent so far and returns
/// the next chunk, or `None` when there is nothing left. An empty chunk also
/// ends the stream. With a known length, the stream ends once that many bytes
/// were sent and any excess in the last chunk is cut off.
///
/// A panic in the generator aborts the response; a panic in the cleanup
/// action is logged. Neither reaches the server.
///
/// The cleanup action runs exactly once: after the generator returned `None`,
/// or when the body is dropped early (the client went away mid-stream, the
/// request was `HEAD`, or the response was never written).
///
/// # Examples
/// ```
/// use simplehttp::{Response, StatusCode, StreamBody};
///
/// let file = b"lamp firmware v1.2".to_vec();
/// let size = file.len() as u64;
///
/// let body = StreamBody::new(Some(size), move |sent| {
///     let start = sent as usize;
///     let end = (start + 8).min(file.len());
///     (start < end).then(|| file[start..end].to_vec())
/// })
/// .on_cleanup(|| println!("file closed"));
///
/// let resp = Response::stream(StatusCode::Ok, body);
/// assert_eq!(resp.body_ref().len(), Some(size));
/// ```
pub struct StreamBody {
    generator: Generator,
    cleanup: Option<Cleanup>,
    length: Option<u64>,
}

impl StreamBody {
    /// Creates a stream of `length` bytes (`None` when unknown).
    ///
    /// Without a known length no `Content-Length` is sent, and the client
    /// reads until the connection closes.
    pub fn new<G>(length: Option<u64>, generator: G) -> Self
    where
        G: FnMut(u64) -> Option<Vec<u8>> + Send + 'static,
    {
        Self {
            generator: Box::new(generator),
            cleanup: None,
            length,
        }
    }

    /// Sets the action run once the stream is over.
    pub fn on_cleanup<C>(mut self, cleanup: C) -> Self
    where
        C: FnOnce() + Send + 'static,
    {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    #[inline]
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Asks the generator for the next chunk; `Ok(None)` ends the stream.
    pub(crate) fn next_chunk(&mut self, sent: u64) -> Result<Option<Vec<u8>>, WriteFault> {
        match catch_unwind(AssertUnwindSafe(|| (self.generator)(sent))) {
            Ok(chunk) => Ok(chunk.filter(|chunk| !chunk.is_empty())),
            Err(_) => {
                error!(sent, "stream generator panicked");
                Err(WriteFault::StreamPanicked)
            }
        }
    }

    /// Runs the cleanup action unless it already ran.
    pub(crate) fn finish(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            if catch_unwind(AssertUnwindSafe(cleanup)).is_err() {
                error!("stream cleanup panicked");
            }
        }
    }
}

impl Drop for StreamBody {
    fn drop(&mut self) {
        self.finish();
    }
}

impl fmt::Debug for StreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBody")
            .field("length", &self.length)
            .field("cleanup", &self.cleanup.is_some())
            .finish_non_exhaustive()
    }
}

impl Response {
    /// Creates a response with an empty body.
    #[inline]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Buffered(Vec::new()),
        }
    }

    /// Adds a header. Headers are written in the order they were added.
    ///
    /// # Panics
    /// In `debug` mode, panics when:
    /// - the name is `Content-Length` or `Connection` (the server sets them);
    /// - the name or value contains `CR` or `LF`;
    /// - the name is empty.
    #[inline]
    #[track_caller]
    pub fn header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        let header = Header::new(name, value);

        debug_assert!(
            !header.name.eq_ignore_ascii_case("content-length")
                && !header.name.eq_ignore_ascii_case("connection"),
            "`Content-Length` and `Connection` are set by the server"
        );
        debug_assert!(
            !header.name.is_empty()
                && !header.name.contains(['\r', '\n'])
                && !header.value.contains(['\r', '\n']),
            "Header name and value must be non-empty single-line text"
        );

        self.headers.push(header);
        self
    }

    /// Adds every `(name, value)` pair in order, see [`header`](Self::header).
    #[inline]
    #[track_caller]
    pub fn headers<I, N, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self = self.header(name, value);
        }
        self
    }

    /// Replaces the body with `bytes`.
    #[inline]
    pub fn body<B: Into<Vec<u8>>>(mut self, bytes: B) -> Self {
        self.body = Body::Buffered(bytes.into());
        self
    }

    /// Replaces the body with a stream.
    #[inline]
    pub fn body_stream(mut self, stream: StreamBody) -> Self {
        self.body = Body::Stream(stream);
        self
    }

    #[inline]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn header_list(&self) -> &[Header] {
        &self.headers
    }

    #[inline]
    pub fn body_ref(&self) -> &Body {
        &self.body
    }

    #[inline]
    pub(crate) fn into_parts(self) -> (StatusCode, Vec<Header>, Body) {
        (self.status, self.headers, self.body)
    }
}

// Shortcuts
impl Response {
    /// Response without body.
    #[inline]
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status)
    }

    /// `text/plain` response.
    #[inline]
    pub fn text<T: Into<String>>(status: StatusCode, text: T) -> Self {
        Self::new(status)
            .header("Content-Type", "text/plain")
            .body(text.into())
    }

    /// `text/html` response.
    #[inline]
    pub fn html<T: Into<String>>(status: StatusCode, html: T) -> Self {
        Self::new(status)
            .header("Content-Type", "text/html")
            .body(html.into())
    }

    /// `application/json` response with `value` serialized as the body.
    ///
    /// A value that cannot be serialized gives an empty
    /// `500 Internal Server Error` response.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => Self::new(status)
                .header("Content-Type", "application/json")
                .body(bytes),
            Err(err) => {
                error!(%err, "response serialization failed");
                Self::new(StatusCode::InternalServerError)
            }
        }
    }

    /// File download: `bytes` with `Content-Disposition: attachment`.
    #[inline]
    pub fn download<B: Into<Vec<u8>>>(status: StatusCode, bytes: B, filename: &str) -> Self {
        Self::new(status)
            .header("Content-Disposition", attachment(filename))
            .body(bytes)
    }

    /// Streamed file download, see [`StreamBody`].
    #[inline]
    pub fn download_stream(status: StatusCode, filename: &str, stream: StreamBody) -> Self {
        Self::new(status)
            .header("Content-Disposition", attachment(filename))
            .body_stream(stream)
    }

    /// Response whose body is produced by `stream`.
    #[inline]
    pub fn stream(status: StatusCode, stream: StreamBody) -> Self {
        Self::new(status).body_stream(stream)
    }
}

fn attachment(filename: &str) -> String {
    let escaped: String = filename
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n'))
        .flat_map(|c| match c {
            '"' | '\\' => vec!['\\', c],
            _ => vec![c],
        })
        .collect();

    format!("attachment; filename=\"{escaped}\"")
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}
