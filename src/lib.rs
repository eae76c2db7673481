//! simplehttp - small embeddable HTTP/1.x server for devices and tools
//!
//! A single-worker HTTP server meant to be embedded in a program that wants
//! to expose a handful of endpoints: a settings page, a JSON control API, a
//! firmware download. Memory use is bounded by configuration and no two
//! requests are ever handled at the same time.
//!
//! # Model
//!
//! - **One request per connection** - every response carries
//!   `Connection: close` and the socket is closed after it is written
//! - **One worker** - accepted connections wait in a bounded FIFO queue and
//!   are served strictly one after another, see [`ServerLimits`](limits::ServerLimits)
//! - **Incremental parsing** - the [`Parser`] accepts the request in chunks of
//!   any size and rejects oversized input before buffering it
//! - **Ordered routes** - [`Route`] patterns with `?` segments and a trailing
//!   `*`, tried in registration order with per-route method sets
//! - **Streaming bodies** - a [`StreamBody`] generator with a cleanup action
//!   that always runs exactly once
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use simplehttp::{Request, Response, Route, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), simplehttp::ServerError> {
//!     Server::builder()
//!         .route(Route::get("/", |_: &Request| {
//!             Response::html(StatusCode::Ok, "<h1>Hello World!</h1>")
//!         }))
//!         .build()
//!         .listen()
//!         .await
//! }
//! ```
//! Path parameters, query parameters and shared state:
//! ```no_run
//! use simplehttp::{Config, Method, Request, Response, Route, Server, StatusCode};
//! use std::sync::atomic::{AtomicU8, Ordering};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), simplehttp::ServerError> {
//!     let brightness = AtomicU8::new(0);
//!
//!     Server::builder()
//!         .config(Config {
//!             host_name: Some("lamp.local".into()),
//!             port: "http-alt".into(),
//!             append_slashes: true,
//!             ..Config::default()
//!         })
//!         .route(Route::get("/users/?", |req: &Request| {
//!             Response::text(StatusCode::Ok, format!("user {}", req.path_params()[0]))
//!         }))
//!         .route(Route::with_context(
//!             Method::Get | Method::Post,
//!             "/brightness",
//!             brightness,
//!             |req: &Request, level: &AtomicU8| {
//!                 if let Some(value) = req.parameter("set").and_then(|v| v.parse().ok()) {
//!                     level.store(value, Ordering::Relaxed);
//!                 }
//!                 Response::text(StatusCode::Ok, level.load(Ordering::Relaxed).to_string())
//!             },
//!         ))
//!         .build()
//!         .listen()
//!         .await
//! }
//! ```
//!
//! # Features
//!
//! - `json` - [`Response::json`] and [`Request::json`] through `serde_json`

pub(crate) mod http {
    pub mod percent;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
    pub(crate) mod writer;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod queue;
    pub(crate) mod server_impl;
}
pub(crate) mod config;
pub(crate) mod errors;
pub mod limits;
pub(crate) mod router;

pub use crate::{
    config::{Config, HostPolicy},
    errors::{ConnectionError, ParseError, ServerError, WriteFault},
    http::{
        percent, query,
        request::{Parsed, Parser, Request},
        response::{Body, Response, StreamBody},
        types::{Field, Header, Method, Methods, Parameter, StatusCode, Version},
    },
    router::{Handler, Resolved, Route, Router},
    server::server_impl::{Server, ServerBuilder},
};

#[cfg(test)]
pub mod tools {
    use crate::Field;
    use std::str::from_utf8;

    #[inline]
    pub fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }

    #[inline]
    pub fn str_field(field: &Field) -> (&str, &str) {
        (field.name.as_str(), field.value.as_str())
    }
}
