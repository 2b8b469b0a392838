//! # Service Layer
//!
//! Reason-keyed responders ([`ReasonResponder`]), per-port accept loops
//! ([`PortListener`]), and the [`Switchboard`] facade owning the port map
//! and the shared worker runtime.

pub mod listener;
pub mod responder;

pub use listener::PortListener;
pub use responder::ReasonResponder;

use crate::config::WireConfig;
use crate::error::Result;
use std::collections::HashMap;
use tokio::runtime::Handle;
use tracing::info;

/// Owns every listening port and the runtime their work runs on.
///
/// The runtime handle is injected at construction (defaulting to the
/// ambient runtime) rather than pulled from a process-wide static, so
/// independent services can be built and torn down in isolation. Log output
/// goes through `tracing`; install whatever subscriber fits the embedding
/// application.
pub struct Switchboard {
    listeners: HashMap<u16, PortListener>,
    handle: Handle,
    config: WireConfig,
}

impl Default for Switchboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Switchboard {
    /// Build on the current tokio runtime with default wire settings.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime; use
    /// [`with_handle`](Self::with_handle) to inject one explicitly.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    /// Build on an explicit runtime handle.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            listeners: HashMap::new(),
            handle,
            config: WireConfig::default(),
        }
    }

    /// Override the wire tunables applied to every listener started after
    /// this call.
    pub fn with_config(mut self, config: WireConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a responder on `port`, creating and starting the port's
    /// listener on first use. Registering the same `(port, reason)` twice
    /// replaces the prior handler. Returns the actual bound port (useful
    /// when `port` is 0).
    pub async fn add_response(&mut self, port: u16, responder: ReasonResponder) -> Result<u16> {
        info!(port, reason = responder.reason(), "registering responder");

        if let Some(listener) = self.listeners.get(&port) {
            listener.add_responder(responder)?;
            return Ok(listener.port());
        }

        let listener = PortListener::start(port, &self.handle, self.config.clone()).await?;
        let bound = listener.port();
        listener.add_responder(responder)?;
        self.listeners.insert(if port == 0 { bound } else { port }, listener);
        Ok(bound)
    }

    /// Stop every listener. Idempotent and irreversible; in-flight
    /// connections run to completion or timeout.
    pub async fn stop_listening(&mut self) {
        info!("stopping all listeners");
        for listener in self.listeners.values() {
            listener.stop().await;
        }
        self.listeners.clear();
    }

    /// Ports currently listening.
    pub fn ports(&self) -> Vec<u16> {
        self.listeners.values().map(PortListener::port).collect()
    }
}
