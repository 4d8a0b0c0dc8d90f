//! Cooperative single-thread loop driving both servers.
//!
//! Each pass polls the HTTP listener without blocking, handles at most one
//! RPC datagram with a zero timeout, then runs the registered tick hooks
//! (periodic work such as refreshing a display). When a pass found nothing
//! to do the loop sleeps for one tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::rpc::RpcServer;
use crate::server::HttpServer;

type TickHook = Box<dyn FnMut() + Send>;

pub struct ServiceLoop {
    http: Option<HttpServer>,
    rpc: Option<RpcServer>,
    tick: Duration,
    hooks: Vec<TickHook>,
}

impl ServiceLoop {
    pub fn new(tick: Duration) -> Self {
        Self {
            http: None,
            rpc: None,
            tick,
            hooks: Vec::new(),
        }
    }

    pub fn with_http(mut self, server: HttpServer) -> Self {
        self.http = Some(server);
        self
    }

    pub fn with_rpc(mut self, server: RpcServer) -> Self {
        self.rpc = Some(server);
        self
    }

    /// Run `hook` once per pass, after both servers were polled.
    pub fn on_tick<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn http(&self) -> Option<&HttpServer> {
        self.http.as_ref()
    }

    pub fn rpc(&self) -> Option<&RpcServer> {
        self.rpc.as_ref()
    }

    /// One pass. Returns whether any request was served.
    pub fn run_once(&mut self) -> bool {
        let mut busy = false;
        if let Some(http) = &self.http {
            match http.poll_once() {
                Ok(served) => busy |= served,
                Err(e) => warn!(error = %e, "HTTP poll failed"),
            }
        }
        if let Some(rpc) = &self.rpc {
            match rpc.handle(Some(Duration::ZERO)) {
                Ok(handled) => busy |= handled,
                Err(e) => warn!(error = %e, "RPC poll failed"),
            }
        }
        for hook in &mut self.hooks {
            hook();
        }
        busy
    }

    /// Loop until `stop` is set.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        info!(
            http = self.http.is_some(),
            rpc = self.rpc.is_some(),
            tick_ms = self.tick.as_millis() as u64,
            "Service loop running"
        );
        while !stop.load(Ordering::Acquire) {
            if !self.run_once() {
                thread::sleep(self.tick);
            }
        }
        info!("Service loop stopped");
    }
}
