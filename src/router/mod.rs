//! # Router Module
//!
//! Handler registries for both protocol engines.
//!
//! ## Overview
//!
//! - [`Router`] holds one exact-path table per HTTP method (GET, POST, PUT,
//!   DELETE). A route is a handler plus the ordered list of parameter names
//!   it wants bound from the query string or form body.
//! - [`RpcRegistry`] maps RPC method names to callables. It is consulted
//!   for every datagram, so registration and removal take effect on the next
//!   request without a restart.
//!
//! Both registries are cheap to clone; clones share the same table behind
//! an `Arc<RwLock<..>>`, so a handler can hold a registry and add or remove
//! entries while the servers are running.
//!
//! ## Example
//!
//! ```rust
//! use edgeserve::router::{HandlerArgs, Router};
//!
//! let router = Router::new();
//! router.get("/echo", &["name"], |args: &HandlerArgs| {
//!     Ok(format!("Hello, {}", args.get("name").unwrap_or("nobody")).into())
//! });
//! assert!(router.lookup(&http::Method::GET, "/echo").is_some());
//! ```
//!
//! ## Panics
//!
//! Handlers are invoked under `catch_unwind`. A panicking handler surfaces as
//! [`HandlerError::Panicked`](crate::error::HandlerError::Panicked) and the
//! server keeps running.

mod core;
mod rpc;

pub use core::{HandlerArgs, HttpHandler, Reply, Route, Router};
pub use rpc::{RpcFn, RpcHandler, RpcKey, RpcRegistry};
