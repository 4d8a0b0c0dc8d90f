use std::collections::HashMap;

use http::Method;
use tracing::debug;

use super::query::{decode_component, parse_query};
use crate::error::ParseError;

/// A parsed HTTP/1.x request.
///
/// Header names are stored exactly as received (no case normalisation);
/// use [`Request::header`] for a case-insensitive lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// One of GET, POST, PUT, DELETE, OPTIONS
    pub method: Method,
    /// Decoded path without the query string
    pub path: String,
    /// Request target exactly as it appeared on the request line
    pub raw_path: String,
    /// Raw query string (text after the first `?`, undecoded)
    pub query_string: String,
    /// Decoded query parameters
    pub query: HashMap<String, String>,
    /// Header map, names as received
    pub headers: HashMap<String, String>,
    /// Protocol version token, e.g. `HTTP/1.1`
    pub version: String,
    /// Body bytes; `None` unless `Content-Length` > 0
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared body length, `0` when the header is absent.
    pub fn content_length(&self) -> Result<usize, ParseError> {
        match self.header("Content-Length") {
            None => Ok(0),
            Some(v) => v
                .trim()
                .parse::<usize>()
                .map_err(|_| ParseError::BadContentLength(v.to_string())),
        }
    }

    /// Number of body bytes still expected on the wire.
    pub fn missing_body_bytes(&self) -> Result<usize, ParseError> {
        let have = self.body.as_ref().map_or(0, Vec::len);
        Ok(self.content_length()?.saturating_sub(have))
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or(&[])
    }
}

/// Offset just past the `CRLFCRLF` that ends the header block.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

fn parse_method(token: &str) -> Result<Method, ParseError> {
    match token {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        "OPTIONS" => Ok(Method::OPTIONS),
        other => Err(ParseError::UnsupportedMethod(other.to_string())),
    }
}

/// Parse the request line and headers, attaching whatever body bytes follow
/// the boundary (capped at `Content-Length`).
///
/// Returns [`ParseError::MalformedHead`] when the boundary has not arrived
/// yet. The path is decoded; the query string is split off first so an
/// escaped `%3F` stays part of the path.
pub fn parse_request_head(buf: &[u8]) -> Result<Request, ParseError> {
    let head_end = find_head_end(buf).ok_or(ParseError::MalformedHead)?;
    let head = String::from_utf8_lossy(&buf[..head_end - 4]);
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or_default().trim();
    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v), None) => (m, t, v),
        _ => return Err(ParseError::BadRequestLine(request_line.to_string())),
    };
    let method = parse_method(method)?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::BadHeader(line.to_string()))?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    // Split before decoding: an escaped `%3F` must not start the query.
    let (raw_route, query_string) = match target.split_once('?') {
        Some((route, query)) => (route, query),
        None => (target, ""),
    };

    let mut request = Request {
        method,
        path: decode_component(raw_route),
        raw_path: target.to_string(),
        query_string: query_string.to_string(),
        query: parse_query(query_string),
        headers,
        version: version.to_string(),
        body: None,
    };

    let declared = request.content_length()?;
    if declared > 0 {
        let available = &buf[head_end..];
        let take = available.len().min(declared);
        request.body = Some(available[..take].to_vec());
    }

    debug!(
        method = %request.method,
        path = %request.path,
        header_count = request.headers.len(),
        content_length = declared,
        "HTTP request head parsed"
    );

    Ok(request)
}
