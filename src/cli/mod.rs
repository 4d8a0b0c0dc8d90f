//! # CLI Module
//!
//! Command-line front end of the `edgeserve` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Run the HTTP server and the RPC server in one cooperative loop until
//! SIGINT or SIGTERM:
//!
//! ```bash
//! edgeserve serve --browse-root ./share --browse-prefix /files
//! ```
//!
//! Options:
//! - `--config <FILE>` - JSON-lines config file
//! - `--http <ADDR>` / `--rpc <ADDR>` - listen addresses
//! - `--browse-root <DIR>` / `--browse-prefix <PREFIX>` - mount the file browser
//! - `--no-http` / `--no-rpc` - run only one of the two engines
//!
//! The demo handlers are registered: `GET /echo?name=..`, and the RPC
//! methods `ping`, `echo`, `listall` and `help`.
//!
//! ### `fire`
//!
//! Send one RPC request and print the reply:
//!
//! ```bash
//! edgeserve fire --host 192.168.4.1 help --params '"ping"'
//! ```
//!
//! `--params` takes any JSON value; anything but an array is wrapped in a
//! one-element list.

mod commands;


pub use commands::{run, run_cli, Cli, Commands, FireArgs, ServeArgs};
