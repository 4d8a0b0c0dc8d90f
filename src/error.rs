//! Error taxonomy shared by both protocol engines.
//!
//! Every error here is recovered at the point of detection and turned into a
//! response (HTTP) or a note (RPC). Only [`ServeError::Transport`] is allowed
//! to escape a serving loop, and the loops in this crate log it and keep
//! going.

use std::fmt;
use std::io;

use crate::codec::Status;

/// Malformed request head or body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No `CRLFCRLF` boundary yet. Streaming readers treat this as
    /// "need more bytes", not as a hard failure.
    MalformedHead,
    /// The request line is not `METHOD PATH VERSION`.
    BadRequestLine(String),
    /// A method outside GET/POST/PUT/DELETE/OPTIONS.
    UnsupportedMethod(String),
    /// A header line without a colon.
    BadHeader(String),
    /// `Content-Length` is not a non-negative integer.
    BadContentLength(String),
    /// multipart/form-data body without a usable boundary or part layout.
    BadMultipart(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedHead => write!(f, "request head is incomplete"),
            ParseError::BadRequestLine(line) => write!(f, "malformed request line '{line}'"),
            ParseError::UnsupportedMethod(m) => write!(f, "unsupported method '{m}'"),
            ParseError::BadHeader(line) => write!(f, "malformed header line '{line}'"),
            ParseError::BadContentLength(v) => write!(f, "invalid Content-Length '{v}'"),
            ParseError::BadMultipart(why) => write!(f, "malformed multipart body: {why}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// An application handler failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler returned an error value.
    Failed(String),
    /// The handler panicked; the panic was caught at the dispatch boundary.
    Panicked(String),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        HandlerError::Failed(msg.into())
    }

    /// Convert a payload from `catch_unwind` into a handler error.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        HandlerError::Panicked(panic_message(payload.as_ref()))
    }
}

/// Text of a panic payload, as carried by `catch_unwind` or `JoinHandle::join`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Failed(msg) => write!(f, "handler failed: {msg}"),
            HandlerError::Panicked(msg) => write!(f, "handler panicked: {msg}"),
        }
    }
}

impl std::error::Error for HandlerError {}

/// File browser failures. All of them map to a structured
/// `{status: 1, info}` body.
#[derive(Debug)]
pub enum BrowseError {
    /// Neither a file nor a directory exists at the resolved path.
    NotFound(String),
    /// The requested path resolves outside the sandbox root.
    EscapesRoot(String),
    /// Upload or mkdir target is already present.
    AlreadyExists(String),
    /// DELETE of a directory that still has entries.
    DirectoryNotEmpty(String),
    /// mkdir or delete aimed at the sandbox root itself.
    RootProtected,
    /// An upload form is missing one of its required fields.
    MissingField(&'static str),
    /// The upload body could not be decoded.
    Form(ParseError),
    /// Any other filesystem failure.
    Io(io::Error),
}

impl BrowseError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            BrowseError::NotFound(_) => Status::NotFound,
            BrowseError::Io(_) => Status::InternalServerError,
            _ => Status::BadRequest,
        }
    }

    /// Text placed in the `info` field of the JSON status object.
    pub fn info(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BrowseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowseError::NotFound(p) => write!(f, "no such file or directory: {p}"),
            BrowseError::EscapesRoot(p) => write!(f, "path escapes the browse root: {p}"),
            BrowseError::AlreadyExists(p) => write!(f, "already exists: {p}"),
            BrowseError::DirectoryNotEmpty(p) => write!(f, "directory not empty: {p}"),
            BrowseError::RootProtected => write!(f, "refusing to modify the browse root"),
            BrowseError::MissingField(name) => write!(f, "missing form field '{name}'"),
            BrowseError::Form(e) => write!(f, "{e}"),
            BrowseError::Io(e) => write!(f, "filesystem error: {e}"),
        }
    }
}

impl std::error::Error for BrowseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowseError::Io(e) => Some(e),
            BrowseError::Form(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseError> for BrowseError {
    fn from(e: ParseError) -> Self {
        BrowseError::Form(e)
    }
}

impl From<io::Error> for BrowseError {
    fn from(e: io::Error) -> Self {
        BrowseError::Io(e)
    }
}

/// The datagram payload could not be turned into an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Not valid JSON (or not UTF-8).
    InvalidJson(String),
    /// Valid JSON, but not an object.
    NotAnObject,
}

impl EnvelopeError {
    /// Diagnostic placed in the `note` of the reply.
    pub fn note(&self) -> &'static str {
        match self {
            EnvelopeError::InvalidJson(_) => "| invalid JSON format |",
            EnvelopeError::NotAnObject => "| payload must be a JSON dict |",
        }
    }
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeError::InvalidJson(e) => write!(f, "invalid JSON envelope: {e}"),
            EnvelopeError::NotAnObject => write!(f, "envelope is not a JSON object"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

/// Top-level error class for one connection or datagram.
#[derive(Debug)]
pub enum ServeError {
    Parse(ParseError),
    NotFound(String),
    Handler(HandlerError),
    Resource(BrowseError),
    Transport(io::Error),
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::Parse(e) => write!(f, "parse error: {e}"),
            ServeError::NotFound(what) => write!(f, "not found: {what}"),
            ServeError::Handler(e) => write!(f, "{e}"),
            ServeError::Resource(e) => write!(f, "{e}"),
            ServeError::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for ServeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServeError::Parse(e) => Some(e),
            ServeError::Handler(e) => Some(e),
            ServeError::Resource(e) => Some(e),
            ServeError::Transport(e) => Some(e),
            ServeError::NotFound(_) => None,
        }
    }
}

impl From<ParseError> for ServeError {
    fn from(e: ParseError) -> Self {
        ServeError::Parse(e)
    }
}

impl From<HandlerError> for ServeError {
    fn from(e: HandlerError) -> Self {
        ServeError::Handler(e)
    }
}

impl From<BrowseError> for ServeError {
    fn from(e: BrowseError) -> Self {
        ServeError::Resource(e)
    }
}

impl From<io::Error> for ServeError {
    fn from(e: io::Error) -> Self {
        ServeError::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browse_error_status_mapping() {
        assert_eq!(BrowseError::NotFound("x".into()).status(), Status::NotFound);
        assert_eq!(BrowseError::EscapesRoot("..".into()).status(), Status::BadRequest);
        assert_eq!(BrowseError::DirectoryNotEmpty("d".into()).status(), Status::BadRequest);
        assert_eq!(
            BrowseError::Io(io::Error::other("boom")).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn test_handler_error_from_panic_payload() {
        let caught = std::panic::catch_unwind(|| panic!("kaput")).unwrap_err();
        assert_eq!(
            HandlerError::from_panic(caught),
            HandlerError::Panicked("kaput".into())
        );
    }

    #[test]
    fn test_envelope_notes() {
        assert_eq!(EnvelopeError::NotAnObject.note(), "| payload must be a JSON dict |");
        assert_eq!(
            EnvelopeError::InvalidJson("eof".into()).note(),
            "| invalid JSON format |"
        );
    }
}
