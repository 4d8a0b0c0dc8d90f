#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use edgeserve::router::RpcRegistry;
use edgeserve::rpc::RpcServer;
use edgeserve::server::{AppService, HttpServer, ServerHandle};

/// Start an HTTP server on an ephemeral port.
pub fn start_http(service: AppService) -> (ServerHandle, SocketAddr) {
    let server = HttpServer::bind("127.0.0.1:0", service).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.start().unwrap();
    handle.wait_ready().unwrap();
    (handle, addr)
}

/// Start an RPC server on an ephemeral port.
pub fn start_rpc(registry: RpcRegistry) -> (ServerHandle, SocketAddr) {
    let server = RpcServer::bind("127.0.0.1:0", registry).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.start().unwrap();
    handle.wait_ready().unwrap();
    (handle, addr)
}

/// Write raw bytes and read until the server closes the connection.
pub fn send_request(addr: &SocketAddr, req: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(req).unwrap();
    let _ = stream.shutdown(Shutdown::Write);
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = Vec::new();
    loop {
        let mut tmp = [0u8; 1024];
        match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                break
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset => break,
            Err(e) => panic!("read error: {e:?}"),
        }
    }
    buf
}

#[derive(Debug)]
pub struct ParsedResponse {
    pub version: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ParsedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub fn parse_response(raw: &[u8]) -> ParsedResponse {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has a header block");
    let head = String::from_utf8_lossy(&raw[..split]);
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default().to_string();
    let status = parts.next().unwrap_or("0").parse().unwrap();
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    ParsedResponse {
        version,
        status,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}

/// Send a request and parse the answer.
pub fn roundtrip(addr: &SocketAddr, req: &[u8]) -> ParsedResponse {
    parse_response(&send_request(addr, req))
}
