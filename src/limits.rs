//! Server limits and timeouts
//!
//! # Defaults
//!
//! Default limits target small devices: one request is parsed at a time, the
//! per-connection buffer never grows much past
//! [`max_body_size`](ReqLimits::max_body_size) + [`recv_buffer_size`](ReqLimits::recv_buffer_size),
//! and at most [`max_queued_connections`](ServerLimits::max_queued_connections)
//! accepted sockets wait for the worker.
//!
//! # Examples
//!
//! ```no_run
//! use simplehttp::{Request, Response, Route, Server, StatusCode};
//! use simplehttp::limits::{ConnLimits, ReqLimits, ServerLimits};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), simplehttp::ServerError> {
//!     Server::builder()
//!         .route(Route::get("/", |_: &Request| Response::text(StatusCode::Ok, "on")))
//!         .server_limits(ServerLimits {
//!             max_queued_connections: 4,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Some(Duration::from_secs(5)),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             max_body_size: 16 * 1024, // 16KB for firmware uploads
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .listen()
//!         .await
//! }
//! ```

use std::time::Duration;

/// Controls connection admission.
///
/// # Connection management
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /-----------------\   No   [-----------------]
/// [ Add to queue ] <====== | Is there a slot? | =====> [ overflow_policy ]
/// [--------------]         \-----------------/        [-----------------]
///        ||
///        \/
/// [------------]
/// [   Worker   ]  one connection at a time, in queue order
/// [------------]
/// ```
///
/// # Worker
/// Exactly one worker task exists. It is spawned by
/// [`Server::listen`](crate::Server::listen) and runs in an infinite loop: take
/// the oldest queued connection, read and parse one request, answer it, close
/// the socket, repeat. Connections are never processed concurrently.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Maximum number of accepted TCP connections waiting for the worker (default: `10`).
    ///
    /// Also used as the `listen(2)` backlog when the server binds its own socket.
    /// What happens when the queue is full is decided by `overflow_policy`.
    pub max_queued_connections: usize,

    /// Behaviour when the queue is full (default: [`OverflowPolicy::Block`]).
    ///
    /// For more information, see [Connection management](#connection-management).
    pub overflow_policy: OverflowPolicy,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_queued_connections: 10,
            overflow_policy: OverflowPolicy::Block,

            _priv: (),
        }
    }
}

/// What the acceptor does with a new connection while the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Stop accepting until the worker frees a slot.
    ///
    /// Clients are delayed (they wait in the kernel backlog), never lost.
    Block,

    /// Close the new connection immediately without a response.
    Drop,

    /// Answer the new connection with
    /// [`503 Service Unavailable`](crate::StatusCode::ServiceUnavailable)
    /// from a detached task, then close it.
    ///
    /// The answer is abandoned after
    /// [`socket_write_timeout`](ConnLimits::socket_write_timeout), or after
    /// one second when that is unset. A client that never reads holds its
    /// task at most that long.
    Reject,
}

/// Connection-level timeouts
///
/// Both are disabled by default: a client that never finishes its request, or
/// never reads the response, holds the single worker for as long as the
/// connection stays open. Set them when that is not acceptable.
#[derive(Debug, Clone, Default)]
pub struct ConnLimits {
    /// Maximum duration to wait for one read from the socket (default: `None`)
    ///
    /// When it elapses, the connection is closed without a response.
    pub socket_read_timeout: Option<Duration>,

    /// Maximum duration of one write to the socket (default: `None`)
    ///
    /// When it elapses, the response is abandoned and the connection closed.
    pub socket_write_timeout: Option<Duration>,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

/// Request parsing limits
///
/// # Memory allocation strategy
///
/// Every connection owns a single accumulation buffer. Bytes are appended in
/// reads of at most `recv_buffer_size`, and consumed lines are trimmed from its
/// front, so the buffer holds at most one partial line during the head and at
/// most `max_body_size` bytes (plus one read) during the body.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Size of a single socket read (default: `1500`, one Ethernet MTU).
    pub recv_buffer_size: usize,

    /// Maximum declared `Content-Length` (default: `4096`).
    ///
    /// A larger declaration is answered with `400 Bad Request` before any of
    /// the body is read.
    pub max_body_size: usize,

    /// Maximum length of the request line and of each header line (default: `1024`).
    ///
    /// A longer request line is answered with `414 URI Too Long`, a longer
    /// header line with `400 Bad Request`.
    pub max_line_size: usize,

    /// Maximum number of header fields (default: `32`).
    pub max_headers: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            recv_buffer_size: 1500,
            max_body_size: 4096,
            max_line_size: 1024,
            max_headers: 32,

            _priv: (),
        }
    }
}
