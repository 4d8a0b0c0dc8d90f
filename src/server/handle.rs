use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::panic_message;

/// Handle to a server running on its own thread.
///
/// Returned by `HttpServer::start` and `RpcServer::start`. The socket is
/// already bound when the handle exists; [`ServerHandle::wait_ready`] waits
/// for the serving loop itself to be entered.
pub struct ServerHandle {
    addr: SocketAddr,
    ready: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Flags shared between a handle and its serving loop.
#[derive(Clone, Default)]
pub struct LoopFlags {
    ready: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl LoopFlags {
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

impl ServerHandle {
    /// Spawn `body` on a named thread with a fresh set of loop flags.
    pub(crate) fn spawn<F>(name: &str, addr: SocketAddr, body: F) -> io::Result<Self>
    where
        F: FnOnce(LoopFlags) + Send + 'static,
    {
        let flags = LoopFlags::default();
        let thread_flags = flags.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(thread_flags))?;
        info!(server = %name, addr = %addr, "Server thread started");
        Ok(Self {
            addr,
            ready: flags.ready,
            stop: flags.stop,
            thread,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait until the serving loop runs.
    ///
    /// # Errors
    ///
    /// `TimedOut` if the loop has not started within ~250ms (50 × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if self.ready.load(Ordering::Acquire) {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Ask the loop to exit after its current poll, then join it.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        match self.thread.join() {
            Ok(()) => info!(addr = %self.addr, "Server thread stopped"),
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(addr = %self.addr, panic = %reason, "Server thread panicked");
            }
        }
    }

    /// Block until the server thread finishes.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the server thread panicked.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[test]
    fn test_stop_joins_loop() {
        let handle = ServerHandle::spawn("loop", local(), |flags| {
            flags.mark_ready();
            while !flags.should_stop() {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();
        handle.wait_ready().unwrap();
        handle.stop();
    }

    #[test]
    fn test_stop_survives_panicked_loop() {
        let handle = ServerHandle::spawn("doomed", local(), |flags| {
            flags.mark_ready();
            panic!("listener gone");
        })
        .unwrap();
        handle.wait_ready().unwrap();
        // Returns after logging the payload instead of propagating it.
        handle.stop();
    }

    #[test]
    fn test_panic_payload_text() {
        let handle = ServerHandle::spawn("doomed", local(), |_| panic!("listener {}", "gone")).unwrap();
        let payload = handle.join().unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "listener gone");
    }
}
