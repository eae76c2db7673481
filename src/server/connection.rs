use crate::{
    config::HostFilter,
    errors::{ConnectionError, ParseError},
    http::{
        request::{Parsed, Parser, Request},
        response::Response,
        types::{Method, StatusCode},
        writer::write_response,
    },
    limits::{ConnLimits, ReqLimits},
    router::Router,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};
use tracing::{debug, error, trace, warn};

/// How a connection ended.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// A handler (or the router's 404) answered with this status.
    Responded(StatusCode),
    /// The request was refused while parsing.
    Rejected(ParseError),
    /// The client closed the connection before sending a full request.
    Disconnected,
    /// Reading or writing failed.
    Failed(ConnectionError),
}

/// Serves one request per connection: read, parse, dispatch, write, close.
pub(crate) struct HttpConnection {
    router: Router,
    host: Option<HostFilter>,
    conn_limits: ConnLimits,
    req_limits: ReqLimits,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(
        router: Router,
        host: Option<HostFilter>,
        conn_limits: ConnLimits,
        req_limits: ReqLimits,
    ) -> Self {
        Self {
            router,
            host,
            conn_limits,
            req_limits,
        }
    }

    /// Serves `stream` to completion and shuts it down.
    pub(crate) async fn run<S>(&self, stream: &mut S) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let outcome = self
            .impl_run(stream)
            .await
            .unwrap_or_else(Outcome::Failed);

        // The peer may already be gone.
        let _ = stream.shutdown().await;

        match &outcome {
            Outcome::Responded(status) => debug!(status = status.as_u16(), "responded"),
            Outcome::Rejected(err) => debug!(%err, "request rejected"),
            Outcome::Disconnected => debug!("client disconnected"),
            Outcome::Failed(err) => warn!(%err, "connection failed"),
        }
        outcome
    }

    async fn impl_run<S>(&self, stream: &mut S) -> Result<Outcome, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let write_timeout = self.conn_limits.socket_write_timeout;
        let mut parser = Parser::new(&self.req_limits).with_host_filter(self.host.clone());
        let mut buffer = vec![0; self.req_limits.recv_buffer_size.max(1)];

        let request = loop {
            let read = self.read(stream, &mut buffer).await?;
            if read == 0 {
                return Ok(Outcome::Disconnected);
            }

            match parser.feed(&buffer[..read]) {
                Ok(Parsed::Continue) => continue,
                Ok(Parsed::Complete(request)) => break request,
                Err(err) => {
                    if let Some(status) = err.status() {
                        write_response(stream, Response::empty(status), false, write_timeout)
                            .await?;
                    }
                    return Ok(Outcome::Rejected(err));
                }
            }
        };

        trace!(method = %request.method(), path = request.path(), "dispatching");

        let head_only = request.method() == Method::Head;
        let response = self.dispatch(request);
        let status = response.status();

        write_response(stream, response, head_only, write_timeout).await?;
        Ok(Outcome::Responded(status))
    }

    #[inline]
    async fn read<S>(&self, stream: &mut S, buffer: &mut [u8]) -> Result<usize, ConnectionError>
    where
        S: AsyncRead + Unpin,
    {
        match self.conn_limits.socket_read_timeout {
            Some(limit) => timeout(limit, stream.read(buffer))
                .await
                .map_err(|_| ConnectionError::ReadTimeout)?
                .map_err(ConnectionError::Read),
            None => stream.read(buffer).await.map_err(ConnectionError::Read),
        }
    }

    /// Runs the router; a panicking handler becomes `500 Internal Server Error`.
    fn dispatch(&self, request: Request) -> Response {
        let method = request.method();
        let path = request.path().to_string();

        match catch_unwind(AssertUnwindSafe(|| self.router.dispatch(request))) {
            Ok(response) => response,
            Err(_) => {
                error!(%method, %path, "handler panicked");
                Response::empty(StatusCode::InternalServerError)
            }
        }
    }
}
