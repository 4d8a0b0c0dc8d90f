//! # Wire Codec Module
//!
//! Stateless encoding and decoding for both protocol engines. Nothing in here
//! touches a socket; the servers feed bytes in and write bytes out.
//!
//! ## HTTP
//!
//! - [`parse_request_head`] turns the bytes of a request into a [`Request`].
//!   A missing `CRLFCRLF` boundary yields [`ParseError::MalformedHead`], which
//!   streaming readers treat as "read more".
//!   The target is split at the first literal `?` before the path is
//!   percent-decoded, so `/a%3Fb` routes as the path `/a?b` and never leaks
//!   into the query map.
//! - [`parse_query`] / [`encode_query`] handle `a=1&b=2` strings.
//! - [`parse_form`] decodes `application/x-www-form-urlencoded` and
//!   `multipart/form-data` bodies into a [`FormData`] map.
//! - [`Response`] and [`encode_response`] assemble the status line, header
//!   block and body, including lazily streamed bodies.
//!
//! ## RPC
//!
//! - [`decode_envelope`] / [`encode_envelope`] convert between datagram
//!   payloads and the JSON [`Envelope`] object.
//!
//! ## Multipart limitation
//!
//! A part carrying a `filename` attribute stores the filename under the fixed
//! key `filename` and its payload under the part's own `name`. One request
//! therefore carries at most one file, and repeated names overwrite earlier
//! parts (last one wins).
//!
//! [`ParseError::MalformedHead`]: crate::error::ParseError::MalformedHead

mod envelope;
mod form;
mod query;
mod request;
mod response;

pub use envelope::{decode_envelope, encode_envelope, Envelope};
pub use form::{build_multipart, parse_form, parse_multipart, FormData, FormValue, MultipartPart};
pub use query::{decode_component, encode_query, parse_query};
pub use request::{find_head_end, parse_request_head, Request};
pub use response::{encode_response, Body, ChunkStream, Response, Status, HTML_CONTENT_TYPE, JSON_CONTENT_TYPE};
