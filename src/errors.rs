use crate::StatusCode;
use std::{io, net::SocketAddr};
use thiserror::Error;

/// Reasons a request can be refused by the [`Parser`](crate::Parser).
///
/// Every variant is terminal for the connection it happened on. Only some of
/// them are answered before closing, see [`ParseError::status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unrecognized request method")]
    InvalidMethod,
    #[error("malformed request line")]
    InvalidRequestLine,
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("request line exceeds {0} bytes")]
    UriTooLong(usize),

    #[error("header line without a value")]
    InvalidHeader,
    #[error("header line exceeds {0} bytes")]
    HeaderTooLarge(usize),
    #[error("more than {0} header fields")]
    TooManyHeaders(usize),
    #[error("invalid content-length value")]
    InvalidContentLength,
    #[error("declared body of {declared} bytes exceeds the limit of {limit}")]
    BodyTooLarge { declared: usize, limit: usize },
    #[error("request head is not valid UTF-8")]
    InvalidEncoding,
    #[error("host {0:?} is not served here")]
    HostMismatch(String),

    #[error("parser has already finished")]
    Finished,
}

macro_rules! error_statuses {
    ($($name:ident => $status:ident;)*) => {
        /// Status the client is told before the connection is closed.
        ///
        /// `None` means the connection is closed silently.
        pub const fn status(&self) -> Option<StatusCode> {
            match self {
                $(Self::$name { .. } => Some(StatusCode::$status),)*
                _ => None,
            }
        }
    };
}

impl ParseError {
    error_statuses! {
        UriTooLong => UriTooLong;
        HeaderTooLarge => BadRequest;
        BodyTooLarge => BadRequest;
        HostMismatch => NotFound;
    }
}

/// Failure while putting a response on the wire.
#[derive(Debug, Error)]
pub enum WriteFault {
    #[error("socket write failed: {0}")]
    Io(#[from] io::Error),
    #[error("socket write timed out")]
    TimedOut,
    #[error("stream body generator panicked")]
    StreamPanicked,
}

/// Why a connection ended without a response being fully delivered.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("socket read failed: {0}")]
    Read(#[source] io::Error),
    #[error("socket read timed out")]
    ReadTimeout,
    #[error(transparent)]
    Write(#[from] WriteFault),
}

/// Fatal errors returned by [`Server::listen`](crate::Server::listen).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("unknown service name {0:?}")]
    UnknownService(String),
    #[error("listener setup failed: {0}")]
    Listener(#[from] io::Error),
}
