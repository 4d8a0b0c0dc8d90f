use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::handle::ServerHandle;
use super::service::{bad_request, AppService};
use crate::codec::{find_head_end, parse_request_head, Request};
use crate::error::{ParseError, ServeError};

/// Socket-level limits for the HTTP engine.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Bytes requested per `read` call
    pub recv_buffer: usize,
    /// Largest accepted request head
    pub max_head: usize,
    /// Largest accepted `Content-Length`
    pub max_body: usize,
    /// Per-read timeout on accepted connections
    pub read_timeout: Option<Duration>,
    /// Sleep between empty polls when running on a background thread
    pub idle_sleep: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            recv_buffer: 2048,
            max_head: 64 * 1024,
            max_body: 64 * 1024 * 1024,
            read_timeout: Some(Duration::from_secs(5)),
            idle_sleep: Duration::from_millis(5),
        }
    }
}

/// Single-threaded HTTP/1.x server.
///
/// Each connection goes Accept → Read → Parse → Dispatch → Respond → Close
/// and is fully answered before the next one is accepted, so handlers are
/// expected to return quickly.
pub struct HttpServer {
    listener: TcpListener,
    service: AppService,
    config: HttpConfig,
}

impl HttpServer {
    /// Bind the listening socket. Bind failure is the only fatal error.
    pub fn bind<A: ToSocketAddrs>(addr: A, service: AppService) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        info!(addr = %listener.local_addr()?, "HTTP server listening");
        Ok(Self {
            listener,
            service,
            config: HttpConfig::default(),
        })
    }

    pub fn with_config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> &AppService {
        &self.service
    }

    /// Block until one connection arrives, then serve it.
    pub fn serve_once(&self) -> io::Result<()> {
        self.listener.set_nonblocking(false)?;
        let (stream, peer) = self.listener.accept()?;
        self.serve_connection(stream, peer);
        Ok(())
    }

    /// Serve one pending connection if there is one. Returns `false` without
    /// blocking when nobody is waiting.
    pub fn poll_once(&self) -> io::Result<bool> {
        self.listener.set_nonblocking(true)?;
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false)?;
                self.serve_connection(stream, peer);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Serve connections forever. Accept errors are logged and skipped.
    pub fn serve_forever(&self) {
        loop {
            if let Err(e) = self.serve_once() {
                warn!(error = %e, "HTTP accept failed");
            }
        }
    }

    /// Move the server onto its own thread.
    pub fn start(self) -> io::Result<ServerHandle> {
        let addr = self.local_addr()?;
        ServerHandle::spawn("edgeserve-http", addr, move |flags| {
            flags.mark_ready();
            while !flags.should_stop() {
                match self.poll_once() {
                    Ok(true) => {}
                    Ok(false) => thread::sleep(self.config.idle_sleep),
                    Err(e) => {
                        warn!(error = %e, "HTTP accept failed");
                        thread::sleep(self.config.idle_sleep);
                    }
                }
            }
        })
    }

    /// Answer one connection. Transport failures are logged, never raised.
    fn serve_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = self.answer(&mut stream, peer) {
            warn!(peer = %peer, error = %e, "HTTP connection failed");
        }
        let _ = stream.shutdown(Shutdown::Both);
    }

    fn answer(&self, stream: &mut TcpStream, peer: SocketAddr) -> Result<(), ServeError> {
        stream.set_read_timeout(self.config.read_timeout)?;
        let response = match self.read_request(stream) {
            Ok(Some(req)) => self.service.call(&req),
            Ok(None) => {
                debug!(peer = %peer, "Connection closed before sending a request");
                return Ok(());
            }
            Err(ServeError::Parse(e)) => {
                warn!(peer = %peer, error = %e, "Rejecting malformed request");
                bad_request(&e)
            }
            Err(e) => return Err(e),
        };
        let sent = response.write_to(stream)?;
        debug!(peer = %peer, body_bytes = sent, "HTTP response sent");
        Ok(())
    }

    /// Read the head up to `CRLFCRLF`, then exactly `Content-Length` body
    /// bytes. `None` means the peer closed without sending anything.
    fn read_request(&self, stream: &mut TcpStream) -> Result<Option<Request>, ServeError> {
        let mut buf = Vec::with_capacity(self.config.recv_buffer);
        let mut chunk = vec![0u8; self.config.recv_buffer.max(1)];

        while find_head_end(&buf).is_none() {
            if buf.len() > self.config.max_head {
                return Err(ParseError::MalformedHead.into());
            }
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut req = parse_request_head(&buf)?;
        let declared = req.content_length()?;
        if declared > self.config.max_body {
            return Err(ParseError::BadContentLength(declared.to_string()).into());
        }

        let mut missing = req.missing_body_bytes()?;
        if missing > 0 {
            let body = req.body.get_or_insert_with(Vec::new);
            body.reserve(missing);
            while missing > 0 {
                let want = missing.min(chunk.len());
                let n = stream.read(&mut chunk[..want])?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("body ended {missing} bytes short"),
                    )
                    .into());
                }
                body.extend_from_slice(&chunk[..n]);
                missing -= n;
            }
        }
        Ok(Some(req))
    }
}
