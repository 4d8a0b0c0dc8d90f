use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::codec::{decode_envelope, encode_envelope, Envelope};
use crate::router::RpcRegistry;
use crate::server::ServerHandle;

const NOTE_MISSING_METHOD: &str = "| missing JSON key 'method' |";
const NOTE_MISSING_PARAMS: &str = "| Warning: missing JSON key 'params' |";
const NOTE_PARAMS_NOT_LIST: &str = "| 'params' key in JSON is not a list |";
const NOTE_NOT_FOUND: &str = "| method not found in registry |";

/// RPC engine settings.
#[derive(Debug, Clone, Copy)]
pub struct RpcConfig {
    /// Receive buffer; longer datagrams are truncated by the OS
    pub buffer_size: usize,
    /// Attach the handler's doc string as `fndoc` when it fails
    pub expose_fndoc: bool,
    /// Wait per poll when running on a background thread
    pub poll_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            expose_fndoc: true,
            poll_timeout: Duration::from_millis(5),
        }
    }
}

/// How one datagram was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not JSON, or not an object
    Undecodable,
    /// Missing or empty `method`; nothing was called
    NoMethod,
    NotFound,
    Ok,
    Failed,
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatchOutcome::Undecodable => "undecodable",
            DispatchOutcome::NoMethod => "no_method",
            DispatchOutcome::NotFound => "not_found",
            DispatchOutcome::Ok => "ok",
            DispatchOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// UDP JSON-RPC server: Wait → Receive → Decode → Dispatch → Encode → Reply.
pub struct RpcServer {
    socket: UdpSocket,
    registry: RpcRegistry,
    config: RpcConfig,
}

impl RpcServer {
    pub fn bind<A: ToSocketAddrs>(addr: A, registry: RpcRegistry) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        info!(addr = %socket.local_addr()?, "RPC server listening");
        Ok(Self {
            socket,
            registry,
            config: RpcConfig::default(),
        })
    }

    pub fn with_config(mut self, config: RpcConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn registry(&self) -> &RpcRegistry {
        &self.registry
    }

    /// Handle at most one datagram.
    ///
    /// `None` waits indefinitely, `Some(Duration::ZERO)` never blocks, any
    /// other value waits at most that long. Returns whether a datagram was
    /// handled; exactly one reply is sent for each one that was.
    pub fn handle(&self, timeout: Option<Duration>) -> io::Result<bool> {
        match timeout {
            Some(t) if t.is_zero() => self.socket.set_nonblocking(true)?,
            other => {
                self.socket.set_nonblocking(false)?;
                self.socket.set_read_timeout(other)?;
            }
        }

        let mut buf = vec![0u8; self.config.buffer_size.max(1)];
        let (n, peer) = match self.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(false)
            }
            Err(e) => return Err(e),
        };

        let (reply, outcome, method) = self.process(&buf[..n]);
        info!(method = %method, peer = %peer, outcome = %outcome, "RPC request handled");
        self.socket.send_to(&reply, peer)?;
        Ok(true)
    }

    /// Decode, dispatch and encode one payload. Also returns the outcome and
    /// the method name for logging.
    pub fn process(&self, payload: &[u8]) -> (Vec<u8>, DispatchOutcome, String) {
        match decode_envelope(payload) {
            Ok(envelope) => {
                let method = method_name(&envelope);
                let (reply, outcome) = self.dispatch(envelope);
                (encode_envelope(&reply), outcome, method)
            }
            Err(e) => {
                debug!(error = %e, bytes = payload.len(), "Undecodable RPC payload");
                let reply = Envelope::diagnostic(e.note());
                (encode_envelope(&reply), DispatchOutcome::Undecodable, String::new())
            }
        }
    }

    /// Run one decoded envelope against the registry.
    pub fn dispatch(&self, mut envelope: Envelope) -> (Envelope, DispatchOutcome) {
        if envelope.method().is_none() {
            envelope.append_note(NOTE_MISSING_METHOD);
        }
        let method = method_name(&envelope);

        let params = match envelope.params() {
            None => {
                envelope.append_note(NOTE_MISSING_PARAMS);
                Vec::new()
            }
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                let wrapped = vec![other.clone()];
                envelope.append_note(NOTE_PARAMS_NOT_LIST);
                wrapped
            }
        };

        if method.is_empty() {
            return (envelope, DispatchOutcome::NoMethod);
        }

        let Some(handler) = self.registry.lookup(&method) else {
            envelope.append_note(NOTE_NOT_FOUND);
            return (envelope, DispatchOutcome::NotFound);
        };

        match handler.call(&params) {
            Ok(result) => {
                envelope.set_result(result);
                (envelope, DispatchOutcome::Ok)
            }
            Err(err) => {
                warn!(method = %method, error = %err, "RPC handler failed");
                let args = Value::Array(params).to_string();
                envelope.append_note(&format!("| Exception calling {method}(*{args}) |"));
                if self.config.expose_fndoc {
                    if let Some(doc) = handler.doc() {
                        envelope.set_fndoc(doc);
                    }
                }
                (envelope, DispatchOutcome::Failed)
            }
        }
    }

    /// Handle datagrams forever; transport errors are logged.
    pub fn serve_forever(&self) {
        loop {
            if let Err(e) = self.handle(None) {
                warn!(error = %e, "RPC receive/reply failed");
            }
        }
    }

    /// Move the server onto its own thread.
    pub fn start(self) -> io::Result<ServerHandle> {
        let addr = self.local_addr()?;
        ServerHandle::spawn("edgeserve-rpc", addr, move |flags| {
            flags.mark_ready();
            while !flags.should_stop() {
                if let Err(e) = self.handle(Some(self.config.poll_timeout)) {
                    warn!(error = %e, "RPC receive/reply failed");
                }
            }
        })
    }
}

fn method_name(envelope: &Envelope) -> String {
    match envelope.method() {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
