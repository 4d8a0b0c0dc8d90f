//! # RPC Module
//!
//! JSON-over-UDP remote procedure calls. One datagram carries one request
//! envelope, one datagram carries the reply back to the sender.
//!
//! ```text
//! → {"method": "ping", "params": []}
//! ← {"method": "ping", "params": [], "note": "", "result": "pong"}
//! ```
//!
//! The reply is the request object with `note` reset to `""` and `result`
//! (and on failure possibly `fndoc`) added. Diagnostics never raise; they
//! are concatenated into `note`:
//!
//! | Situation                         | Note text                                   |
//! |-----------------------------------|---------------------------------------------|
//! | payload not JSON                  | `\| invalid JSON format \|` (reply has only `note`) |
//! | payload not an object             | `\| payload must be a JSON dict \|` (reply has only `note`) |
//! | no `method` key                   | `\| missing JSON key 'method' \|`           |
//! | no `params` key                   | `\| Warning: missing JSON key 'params' \|`  |
//! | `params` not a list               | `\| 'params' key in JSON is not a list \|`  |
//! | unknown method                    | `\| method not found in registry \|`        |
//! | handler failed                    | `\| Exception calling m(*[..]) \|`           |
//!
//! The failure reason itself is only logged; the reply carries the arguments
//! and, when documented, the handler's `fndoc`.
//!
//! [`RpcServer`] is the receiving side; [`client::fire`] is a small blocking
//! client used by the `fire` subcommand.

pub mod client;
mod server;

pub use server::{DispatchOutcome, RpcConfig, RpcServer};
