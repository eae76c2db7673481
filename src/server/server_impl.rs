use crate::{
    config::Config,
    errors::ServerError,
    http::{response::Response, types::StatusCode, writer::write_response},
    limits::{ConnLimits, OverflowPolicy, ReqLimits, ServerLimits},
    router::{Route, Router},
    server::{connection::HttpConnection, queue::WorkQueue},
};
use futures_util::FutureExt;
use socket2::{Domain, Protocol, Socket, Type};
use std::{net::SocketAddr, panic::AssertUnwindSafe, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::sleep,
};
use tracing::{debug, debug_span, error, info, warn, Instrument};

/// Write deadline for a `503` answer when no socket write timeout is set.
const REJECTION_TIMEOUT: Duration = Duration::from_secs(1);

/// An HTTP/1.x server answering one request per connection, one connection
/// at a time.
///
/// Built with [`Server::builder`], started with [`Server::listen`].
///
/// # Examples
///
/// ```no_run
/// use simplehttp::{Config, Request, Response, Route, Server, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), simplehttp::ServerError> {
///     Server::builder()
///         .config(Config {
///             port: "8080".into(),
///             ..Config::default()
///         })
///         .route(Route::get("/", |_: &Request| Response::text(StatusCode::Ok, "Hello world!")))
///         .build()
///         .listen()
///         .await
/// }
/// ```
pub struct Server {
    config: Config,
    listener: Option<TcpListener>,
    connection: HttpConnection,
    server_limits: ServerLimits,
    write_timeout: Option<Duration>,
}

type Queue = Arc<WorkQueue<(TcpStream, SocketAddr)>>;

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Binds (unless a listener was supplied), starts the worker and accepts
    /// connections forever.
    ///
    /// Returns only when the listening socket cannot be set up.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use simplehttp::{Request, Response, Route, Server, StatusCode};
    /// use tokio::net::TcpListener;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), simplehttp::ServerError> {
    /// Server::builder()
    ///     .listener(TcpListener::bind("127.0.0.1:8080").await?)
    ///     .route(Route::get("/", |_: &Request| Response::empty(StatusCode::NoContent)))
    ///     .build()
    ///     .listen()
    ///     .await
    /// # }
    /// ```
    pub async fn listen(self) -> Result<(), ServerError> {
        let listener = match self.listener {
            Some(listener) => listener,
            None => bind(
                self.config.socket_addr()?,
                self.server_limits.max_queued_connections,
            )?,
        };

        let queue: Queue = Arc::new(WorkQueue::new(self.server_limits.max_queued_connections));
        Self::spawn_worker(&queue, self.connection);

        info!(
            addr = %listener.local_addr()?,
            capacity = queue.capacity(),
            policy = ?self.server_limits.overflow_policy,
            "listening"
        );

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(value) => value,
                Err(err) => {
                    warn!(%err, "accept failed");
                    // Usually descriptor exhaustion; give the worker a moment.
                    sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };
            debug!(%peer, queued = queue.len(), "accepted");

            match self.server_limits.overflow_policy {
                OverflowPolicy::Block => queue.push((stream, peer)).await,
                OverflowPolicy::Drop => {
                    if let Err((stream, peer)) = queue.try_push((stream, peer)) {
                        debug!(%peer, "queue full, connection dropped");
                        drop(stream);
                    }
                }
                OverflowPolicy::Reject => {
                    if let Err((stream, peer)) = queue.try_push((stream, peer)) {
                        debug!(%peer, "queue full, connection rejected");
                        Self::spawn_rejection(stream, self.write_timeout);
                    }
                }
            }
        }
    }

    fn spawn_worker(queue: &Queue, connection: HttpConnection) {
        let queue = queue.clone();

        tokio::spawn(async move {
            loop {
                let (mut stream, peer) = queue.pop().await;

                let served = AssertUnwindSafe(connection.run(&mut stream))
                    .catch_unwind()
                    .instrument(debug_span!("connection", %peer))
                    .await;
                if served.is_err() {
                    error!(%peer, "connection panicked, worker continues");
                }
            }
        });
    }

    fn spawn_rejection(mut stream: TcpStream, write_timeout: Option<Duration>) {
        let limit = write_timeout.unwrap_or(REJECTION_TIMEOUT);
        tokio::spawn(async move { reject(&mut stream, limit).await });
    }
}

/// Answers `503 Service Unavailable` and closes, giving up after `limit`.
async fn reject<S>(stream: &mut S, limit: Duration)
where
    S: AsyncWrite + Unpin,
{
    let response = Response::empty(StatusCode::ServiceUnavailable);
    if let Err(err) = write_response(stream, response, false, Some(limit)).await {
        debug!(%err, "rejection not delivered");
    }
    let _ = stream.shutdown().await;
}

fn bind(addr: SocketAddr, backlog: usize) -> Result<TcpListener, ServerError> {
    let bind_err = |source| ServerError::Bind { addr, source };

    let socket =
        Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket
        .listen(i32::try_from(backlog).unwrap_or(i32::MAX))
        .map_err(bind_err)?;

    Ok(TcpListener::from_std(socket.into())?)
}

/// Builder for configuring and creating [`Server`] instances.
///
/// Nothing is required: without routes every request is answered with
/// `404 Not Found`, without a listener the server binds
/// [`Config::socket_addr`] itself.
#[derive(Default)]
pub struct ServerBuilder {
    config: Option<Config>,
    routes: Vec<Route>,
    listener: Option<TcpListener>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
}

impl ServerBuilder {
    /// Sets the listening configuration, see [`Config`].
    #[inline(always)]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Appends a route. Routes are tried in the order they were added.
    #[inline(always)]
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Appends several routes, keeping their order.
    #[inline(always)]
    pub fn routes<I: IntoIterator<Item = Route>>(mut self, routes: I) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Uses an already bound listener instead of binding
    /// [`Config::socket_addr`]. `bind_addr` and `port` are then ignored.
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Configures connection admission, see [`ServerLimits`].
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures socket timeouts, see [`ConnLimits`].
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures request parsing limits, see [`ReqLimits`].
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Panics when [`ServerLimits::max_queued_connections`] is `0`.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let config = self.config.unwrap_or_default();
        let server_limits = self.server_limits.unwrap_or_default();
        let conn_limits = self.connection_limits.unwrap_or_default();

        assert!(
            server_limits.max_queued_connections > 0,
            "`max_queued_connections` must be at least 1"
        );

        let write_timeout = conn_limits.socket_write_timeout;
        let connection = HttpConnection::new(
            Router::new(self.routes, config.append_slashes),
            config.host_filter(),
            conn_limits,
            self.request_limits.unwrap_or_default(),
        );

        Server {
            config,
            listener: self.listener,
            connection,
            server_limits,
            write_timeout,
        }
    }
}
