//! # HTTP Server Module
//!
//! The blocking HTTP/1.x engine and its dispatcher.
//!
//! - [`HttpServer`] owns the listening socket and walks each connection
//!   through Accept → Read → Parse → Dispatch → Respond → Close. It can be
//!   driven by hand ([`HttpServer::serve_once`], [`HttpServer::poll_once`]),
//!   from a [`ServiceLoop`](crate::service_loop::ServiceLoop), or moved to its
//!   own thread with [`HttpServer::start`].
//! - [`AppService`] decides what answers a parsed request: CORS preflight,
//!   an exact [`Router`](crate::router::Router) match, the
//!   [`FileBrowser`](crate::browser::FileBrowser), or a 404/400.
//! - [`CorsPolicy`] is the fixed preflight block plus the allow-origin header
//!   on ordinary responses.
//!
//! A failing connection (timeout, reset, short body) is logged and closed;
//! the server carries on with the next one.

mod cors;
mod handle;
mod http_server;
mod service;

pub use cors::CorsPolicy;
pub use handle::{LoopFlags, ServerHandle};
pub use http_server::{HttpConfig, HttpServer};
pub use service::{bad_request, default_status, AppService};
