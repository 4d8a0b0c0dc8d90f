//! Blocking one-shot RPC client.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::codec::{encode_envelope, Envelope};

/// Large enough for any UDP payload.
const REPLY_BUFFER: usize = 64 * 1024;

fn resolve<A: ToSocketAddrs>(target: A) -> io::Result<SocketAddr> {
    target
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target resolved to no address"))
}

/// Send raw bytes and wait for one reply datagram.
///
/// # Errors
///
/// `WouldBlock`/`TimedOut` when nothing arrives within `timeout`.
pub fn fire_raw<A: ToSocketAddrs>(target: A, payload: &[u8], timeout: Duration) -> io::Result<Vec<u8>> {
    let target = resolve(target)?;
    let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(local)?;
    socket.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
    socket.send_to(payload, target)?;
    debug!(target = %target, bytes = payload.len(), "RPC request sent");

    let mut buf = vec![0u8; REPLY_BUFFER];
    let (n, from) = socket.recv_from(&mut buf)?;
    debug!(from = %from, bytes = n, "RPC reply received");
    buf.truncate(n);
    Ok(buf)
}

/// Call `method` with positional `params` and return the decoded reply
/// envelope (including `note` and, on success, `result`).
pub fn fire<A: ToSocketAddrs>(
    target: A,
    method: &str,
    params: Vec<Value>,
    timeout: Duration,
) -> io::Result<Value> {
    let request = encode_envelope(&Envelope::request(method, params));
    let reply = fire_raw(target, &request, timeout)?;
    serde_json::from_slice(&reply).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Turn a CLI-supplied JSON value into positional params: arrays are used
/// as-is, anything else becomes a one-element list.
pub fn params_from_value(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_from_value() {
        assert_eq!(params_from_value(json!([1, 2])), vec![json!(1), json!(2)]);
        assert_eq!(params_from_value(json!("x")), vec![json!("x")]);
        assert_eq!(params_from_value(json!({"k": 1})), vec![json!({"k": 1})]);
    }

    #[test]
    fn test_fire_times_out_without_server() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = silent.local_addr().unwrap();
        let err = fire(addr, "ping", vec![], Duration::from_millis(50)).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
    }
}
