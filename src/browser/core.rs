use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use http::Method;
use serde_json::json;
use tracing::{debug, info, warn};

use super::listing::{read_entries, render_html, render_json};
use crate::codec::{parse_form, Body, Request, Response, Status, JSON_CONTENT_TYPE};
use crate::error::BrowseError;

/// Read size for streamed downloads.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Lazily reads a file in fixed-size chunks, stopping at `remaining` bytes.
pub struct FileChunks {
    file: File,
    chunk_size: usize,
    remaining: u64,
}

impl FileChunks {
    pub fn new(file: File, len: u64, chunk_size: usize) -> Self {
        Self {
            file,
            chunk_size: chunk_size.max(1),
            remaining: len,
        }
    }
}

impl Iterator for FileChunks {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let want = self.remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; want];
        match self.file.read(&mut buf) {
            Ok(0) => {
                self.remaining = 0;
                Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "file shrank while streaming",
                )))
            }
            Ok(n) => {
                buf.truncate(n);
                self.remaining -= n as u64;
                Some(Ok(buf))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Sandboxed file browser mounted under a URL prefix.
#[derive(Debug, Clone)]
pub struct FileBrowser {
    root: PathBuf,
    prefix: String,
    chunk_size: usize,
}

impl FileBrowser {
    /// The root is canonicalized once here; it must exist and be a directory.
    /// The prefix gets a leading `/` and loses any trailing one.
    pub fn new(root: impl AsRef<Path>, prefix: &str) -> Result<Self, BrowseError> {
        let root = root.as_ref();
        let canonical = fs::canonicalize(root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BrowseError::NotFound(root.display().to_string()),
            _ => BrowseError::Io(e),
        })?;
        if !canonical.is_dir() {
            return Err(BrowseError::NotFound(root.display().to_string()));
        }
        let prefix = format!("/{}", prefix.trim_matches('/'));
        info!(root = %canonical.display(), prefix = %prefix, "File browser mounted");
        Ok(Self {
            root: canonical,
            prefix,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `path` falls under the browse prefix. `/filesystem` does not
    /// match a `/files` prefix.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Path below the prefix, without leading slashes.
    fn relative<'a>(&self, path: &'a str) -> &'a str {
        let rest = if self.prefix == "/" {
            path
        } else {
            path.strip_prefix(self.prefix.as_str()).unwrap_or(path)
        };
        rest.trim_start_matches('/')
    }

    /// Map a root-relative path onto the filesystem, refusing anything that
    /// leaves the sandbox.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf, BrowseError> {
        let mut target = self.root.clone();
        for comp in Path::new(rel).components() {
            match comp {
                Component::Normal(part) => target.push(part),
                Component::CurDir => {}
                _ => return Err(BrowseError::EscapesRoot(rel.to_string())),
            }
        }

        let mut probe = target.as_path();
        loop {
            match probe.canonicalize() {
                Ok(real) => {
                    if !real.starts_with(&self.root) {
                        warn!(requested = %rel, resolved = %real.display(), "Path escapes browse root");
                        return Err(BrowseError::EscapesRoot(rel.to_string()));
                    }
                    break;
                }
                Err(_) => match probe.parent() {
                    Some(parent) => probe = parent,
                    None => break,
                },
            }
        }
        Ok(target)
    }

    /// Handle a request already known to match the prefix.
    pub fn handle(&self, req: &Request) -> Response {
        let rel = self.relative(&req.path);
        let outcome = match req.method {
            Method::GET => self.get(req, rel),
            Method::POST => self.upload(req, rel),
            Method::PUT => self.mkdir(rel),
            Method::DELETE => self.delete(rel),
            _ => Err(BrowseError::NotFound(req.path.clone())),
        };
        outcome.unwrap_or_else(|e| {
            warn!(method = %req.method, path = %req.path, error = %e, "File browser request failed");
            Response::json(e.status(), json!({ "status": 1, "info": e.info() }))
        })
    }

    fn url_for(&self, rel: &str) -> String {
        let rel = rel.trim_end_matches('/');
        match (self.prefix.as_str(), rel.is_empty()) {
            (prefix, true) => prefix.to_string(),
            ("/", false) => format!("/{rel}"),
            (prefix, false) => format!("{prefix}/{rel}"),
        }
    }

    fn get(&self, req: &Request, rel: &str) -> Result<Response, BrowseError> {
        let target = self.resolve(rel)?;
        let meta = fs::metadata(&target).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BrowseError::NotFound(rel.to_string()),
            _ => BrowseError::Io(e),
        })?;

        if meta.is_file() {
            let file = File::open(&target)?;
            let len = meta.len();
            debug!(path = %target.display(), size = len, chunk_size = self.chunk_size, "Streaming file");
            let chunks = FileChunks::new(file, len, self.chunk_size);
            return Ok(Response::new(
                Status::Ok,
                Body::Stream { len, chunks: Box::new(chunks) },
            ));
        }

        let entries = read_entries(&target)?;
        let url_path = self.url_for(rel);
        let wants_json = req.query.get("format").is_some_and(|f| f == "json")
            || req
                .header("Accept")
                .is_some_and(|a| a.contains(JSON_CONTENT_TYPE));
        if wants_json {
            return Ok(Response::json(Status::Ok, render_json(&url_path, &entries)));
        }
        let html = render_html(&url_path, rel.trim_matches('/').is_empty(), &entries)
            .map_err(|e| BrowseError::Io(io::Error::other(e)))?;
        Ok(Response::new(Status::Ok, html))
    }

    fn upload(&self, req: &Request, rel: &str) -> Result<Response, BrowseError> {
        let form = parse_form(req)?;
        let filename = form
            .get("filename")
            .and_then(|v| v.as_text())
            .filter(|s| !s.is_empty())
            .ok_or(BrowseError::MissingField("filename"))?;
        let content = form
            .get("filecontent")
            .ok_or(BrowseError::MissingField("filecontent"))?
            .as_bytes();
        let filedir = match form.get("filedir").and_then(|v| v.as_text()) {
            Some(dir) if self.matches(dir) => self.relative(dir),
            Some(dir) => dir.trim_start_matches('/'),
            None => rel,
        };

        let dest_rel = if filedir.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", filedir.trim_end_matches('/'), filename)
        };
        let target = self.resolve(&dest_rel)?;

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => BrowseError::AlreadyExists(dest_rel.clone()),
                io::ErrorKind::NotFound => BrowseError::NotFound(filedir.to_string()),
                _ => BrowseError::Io(e),
            })?;
        fill_or_discard(file, &target, content)?;

        info!(path = %target.display(), bytes = content.len(), "File uploaded");
        Ok(Response::json(
            Status::Created,
            json!({ "status": 0, "info": format!("wrote {} bytes to {}", content.len(), self.url_for(&dest_rel)) }),
        ))
    }

    fn mkdir(&self, rel: &str) -> Result<Response, BrowseError> {
        if rel.trim_matches('/').is_empty() {
            return Err(BrowseError::RootProtected);
        }
        let target = self.resolve(rel)?;
        fs::create_dir(&target).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => BrowseError::AlreadyExists(rel.to_string()),
            io::ErrorKind::NotFound => BrowseError::NotFound(rel.to_string()),
            _ => BrowseError::Io(e),
        })?;
        info!(path = %target.display(), "Directory created");
        Ok(Response::json(
            Status::Created,
            json!({ "status": 0, "info": format!("created directory {}", self.url_for(rel)) }),
        ))
    }

    fn delete(&self, rel: &str) -> Result<Response, BrowseError> {
        if rel.trim_matches('/').is_empty() {
            return Err(BrowseError::RootProtected);
        }
        let target = self.resolve(rel)?;
        let meta = fs::symlink_metadata(&target).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BrowseError::NotFound(rel.to_string()),
            _ => BrowseError::Io(e),
        })?;

        if meta.is_dir() {
            if fs::read_dir(&target)?.next().is_some() {
                return Err(BrowseError::DirectoryNotEmpty(rel.to_string()));
            }
            fs::remove_dir(&target)?;
        } else {
            fs::remove_file(&target)?;
        }
        info!(path = %target.display(), is_dir = meta.is_dir(), "Path deleted");
        Ok(Response::json(
            Status::Ok,
            json!({ "status": 0, "info": format!("deleted {}", self.url_for(rel)) }),
        ))
    }
}

/// Write a freshly created upload. On failure the partial file is removed
/// so a retry does not trip over `AlreadyExists`.
fn fill_or_discard<W: Write>(mut out: W, target: &Path, content: &[u8]) -> io::Result<()> {
    let written = out.write_all(content).and_then(|()| out.flush());
    if let Err(e) = written {
        drop(out);
        warn!(path = %target.display(), error = %e, "Upload write failed, removing partial file");
        if let Err(rm) = fs::remove_file(target) {
            warn!(path = %target.display(), error = %rm, "Could not remove partial upload");
        }
        return Err(e);
    }
    Ok(())
}
