//! # File Browser Module
//!
//! A read/write view of one sandboxed directory, mounted under a URL prefix
//! (`/files` by default). The HTTP service consults it only when no explicit
//! route matched.
//!
//! | Method | Target                | Effect                                   |
//! |--------|-----------------------|------------------------------------------|
//! | GET    | `<prefix>/<file>`     | file bytes, streamed in fixed chunks     |
//! | GET    | `<prefix>/<dir>`      | directory listing (HTML, or JSON)        |
//! | POST   | `<prefix>/...`        | multipart upload (`filedir`, `filename`, `filecontent`) |
//! | PUT    | `<prefix>/<name>`     | create directory                         |
//! | DELETE | `<prefix>/<name>`     | remove file, or empty directory          |
//!
//! Everything except a file download answers with `{"status": 0|1, "info": ..}`.
//!
//! ## Sandboxing
//!
//! Every request path is resolved against the canonical root. A `..`, a root
//! or a prefix component is rejected outright; the deepest existing ancestor
//! of the target is then canonicalized and must still lie inside the root,
//! which also catches symlinks pointing out of the sandbox.
//!
//! Directory listings are rendered with `minijinja`. Pass `?format=json` or
//! an `Accept: application/json` header for the structured form.

mod core;
mod listing;

pub use core::{FileBrowser, FileChunks, DEFAULT_CHUNK_SIZE};
pub use listing::{human_size, DirEntryInfo};
