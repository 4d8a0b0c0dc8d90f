//! # edgeserve
//!
//! **edgeserve** is a small, dependency-light HTTP/1.x server with a
//! sandboxed file browser, paired with a JSON-over-UDP RPC endpoint. It is
//! built for boards and lab boxes where one thread has to serve a control
//! page, hand out files and answer remote calls.
//!
//! ## Architecture
//!
//! - **[`codec`]** - HTTP request/response and RPC envelope wire formats
//! - **[`router`]** - Exact-path HTTP route tables and the RPC registry
//! - **[`browser`]** - File browser over one sandboxed directory
//! - **[`server`]** - The HTTP engine and its dispatcher
//! - **[`rpc`]** - The UDP RPC engine and a one-shot client
//! - **[`service_loop`]** - Cooperative loop driving both engines on one thread
//! - **[`runtime_config`]** - Defaults, JSON-lines file and `EDGE_*` overrides
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`cli`]** - The `edgeserve` command line
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant HTTP as server::HttpServer
//!     participant Svc as server::AppService
//!     participant Router as router::Router
//!     participant FB as browser::FileBrowser
//!
//!     Client->>HTTP: TCP connect + request
//!     HTTP->>HTTP: read head, then Content-Length body
//!     HTTP->>Svc: call(&Request)
//!     alt OPTIONS
//!         Svc-->>HTTP: 204 + CORS headers
//!     else exact route
//!         Svc->>Router: lookup(method, path)
//!         Router-->>Svc: Route
//!         Svc->>Svc: bind args, invoke handler
//!     else under browse prefix
//!         Svc->>FB: handle(&Request)
//!     else
//!         Svc-->>HTTP: 404 (GET) / 400
//!     end
//!     HTTP-->>Client: response, close
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use std::time::Duration;
//!
//! use edgeserve::router::{RpcRegistry, Router};
//! use edgeserve::rpc::RpcServer;
//! use edgeserve::server::{AppService, HttpServer};
//! use edgeserve::service_loop::ServiceLoop;
//! use serde_json::json;
//!
//! # fn main() -> std::io::Result<()> {
//! let router = Router::new();
//! router.get("/echo", &["name"], |args| Ok(json!({ "msg": args.get("name") }).into()));
//!
//! let registry = RpcRegistry::new();
//! registry.install_introspection();
//! registry.register_fn("ping", |_| Ok(json!("pong")));
//!
//! let mut service_loop = ServiceLoop::new(Duration::from_millis(10))
//!     .with_http(HttpServer::bind("0.0.0.0:8080", AppService::new(router))?)
//!     .with_rpc(RpcServer::bind("0.0.0.0:5001", registry)?);
//! service_loop.run_until(&AtomicBool::new(false));
//! # Ok(())
//! # }
//! ```
//!
//! ## Execution Model
//!
//! Single-threaded and cooperative by default: each engine handles one
//! connection or datagram at a time and the service loop interleaves them
//! with non-blocking polls. Either engine can instead be moved onto its own
//! thread with `start()`; registries are shared behind `RwLock`s so handlers
//! can still be added while serving.

pub mod browser;
pub mod cli;
pub mod codec;
mod echo;
pub mod error;
pub mod logging;
pub mod router;
pub mod rpc;
pub mod runtime_config;
pub mod server;
pub mod service_loop;

pub use codec::{Request, Response, Status};
pub use error::{BrowseError, EnvelopeError, HandlerError, ParseError, ServeError};
pub use router::{HandlerArgs, Reply, RpcHandler, RpcRegistry, Router};
