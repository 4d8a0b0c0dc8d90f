use std::fmt;
use std::io::{self, Write};

use serde_json::Value;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=UTF-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// The status codes this server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Created,
    Accepted,
    NoContent,
    BadRequest,
    NotFound,
    InternalServerError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::Accepted => 202,
            Status::NoContent => 204,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Created => "Created",
            Status::Accepted => "Accepted",
            Status::NoContent => "No Content",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
        }
    }

    pub fn from_code(code: u16) -> Option<Status> {
        Some(match code {
            200 => Status::Ok,
            201 => Status::Created,
            202 => Status::Accepted,
            204 => Status::NoContent,
            400 => Status::BadRequest,
            404 => Status::NotFound,
            500 => Status::InternalServerError,
            _ => return None,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// Lazy body source: each item is one chunk read from disk.
pub type ChunkStream = Box<dyn Iterator<Item = io::Result<Vec<u8>>> + Send>;

/// Response payload.
pub enum Body {
    Empty,
    Text(String),
    Json(Value),
    Bytes(Vec<u8>),
    /// Streamed body of known total length.
    Stream { len: u64, chunks: ChunkStream },
}

impl Body {
    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Json(_) => JSON_CONTENT_TYPE,
            _ => HTML_CONTENT_TYPE,
        }
    }

    /// Byte length announced in `Content-Length`.
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Text(s) => s.len() as u64,
            Body::Json(v) => v.to_string().len() as u64,
            Body::Bytes(b) => b.len() as u64,
            Body::Stream { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => write!(f, "Empty"),
            Body::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Body::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Body::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Body::Stream { len, .. } => write!(f, "Stream({len} bytes)"),
        }
    }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        Body::Json(v)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Text(s)
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Body::Bytes(b)
    }
}

/// An HTTP response ready to be written.
///
/// `Content-Type` and `Content-Length` are derived from the body. Extra
/// headers replace a derived header of the same name (case-insensitive) and
/// are otherwise appended in insertion order.
#[derive(Debug)]
pub struct Response {
    pub version: String,
    pub status: Status,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Response {
    pub fn new(status: Status, body: impl Into<Body>) -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: Status, value: Value) -> Self {
        Self::new(status, Body::Json(value))
    }

    pub fn empty(status: Status) -> Self {
        Self::new(status, Body::Empty)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Headers exactly as they go on the wire.
    pub fn header_block(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("Content-Type".to_string(), self.body.content_type().to_string()),
            ("Content-Length".to_string(), self.body.len().to_string()),
        ];
        for (name, value) in &self.headers {
            match out.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                Some(slot) => slot.1 = value.clone(),
                None => out.push((name.clone(), value.clone())),
            }
        }
        out
    }

    /// Write the status line, headers and body. Streamed bodies are pulled
    /// chunk by chunk and capped at the announced length.
    pub fn write_to<W: Write>(self, out: &mut W) -> io::Result<u64> {
        let mut head = format!("{} {} {}\r\n", self.version, self.status.code(), self.status.reason());
        for (name, value) in self.header_block() {
            head.push_str(&name);
            head.push_str(": ");
            head.push_str(&value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        out.write_all(head.as_bytes())?;

        let written = match self.body {
            Body::Empty => 0,
            Body::Text(s) => {
                out.write_all(s.as_bytes())?;
                s.len() as u64
            }
            Body::Json(v) => {
                let s = v.to_string();
                out.write_all(s.as_bytes())?;
                s.len() as u64
            }
            Body::Bytes(b) => {
                out.write_all(&b)?;
                b.len() as u64
            }
            Body::Stream { len, chunks } => {
                let mut sent = 0u64;
                for chunk in chunks {
                    if sent >= len {
                        break;
                    }
                    let chunk = chunk?;
                    let take = chunk.len().min((len - sent) as usize);
                    out.write_all(&chunk[..take])?;
                    sent += take as u64;
                }
                if sent < len {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("body stream ended after {sent} of {len} bytes"),
                    ));
                }
                sent
            }
        };
        out.flush()?;
        Ok(written)
    }
}

/// Serialise a full response into one buffer.
pub fn encode_response(response: Response) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    response.write_to(&mut buf)?;
    Ok(buf)
}
