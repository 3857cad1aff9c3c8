//! The event loop.
//!
//! ```rust,ignore
//! use sockserv::{Server, ServerConfig};
//!
//! let mut server = Server::new(ServerConfig::default());
//! server.register_handler(Box::new(Echo));
//! server.run()?;
//! ```
//!
//! Each pass of [`Server::poll`] tries one non-blocking accept on the
//! listener, then visits every connection: unhandshaken connections get their
//! upgrade request answered, handshaken ones have their frame decoded and
//! handed to [`Handler::on_data`]. Everything runs on the caller's thread.
//!
//! The listener is left alone while no handler is registered, and events
//! raised without a handler are dropped, never replayed to a later one.

use std::net::SocketAddr;
use std::thread;

use crate::config::ServerConfig;
use crate::error::{Result, SockError};
use crate::handler::{Event, Handler, ServerHandle};
use crate::id::ConnectionId;
use crate::registry::ConnectionRegistry;

/// Message reported when the upgrade request could not be answered
pub const HANDSHAKE_FAILED: &str = "Client could not do Handshake - closing connection";

/// Single-threaded WebSocket server
pub struct Server {
    config: ServerConfig,
    registry: ConnectionRegistry,
    handler: Option<Box<dyn Handler>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let registry = ConnectionRegistry::new(&config);
        Self {
            config,
            registry,
            handler: None,
        }
    }

    /// Install the handler, replacing any previous one.
    ///
    /// The handler's [`Handler::registered`] hook runs immediately.
    pub fn register_handler(&mut self, mut handler: Box<dyn Handler>) {
        self.registry.clear_events();
        handler.registered(&mut ServerHandle::new(&mut self.registry));
        self.handler = Some(handler);
        self.dispatch();
    }

    /// Bind and listen on the configured address
    pub fn open(&mut self) -> Result<SocketAddr> {
        self.config.validate()?;
        self.registry.open(&self.config.bind_addr, self.config.port)
    }

    /// Bound address, once opened
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.registry.local_addr()
    }

    /// Open the listener and poll forever.
    ///
    /// Returns only when no handler is registered or the listener cannot be
    /// opened.
    pub fn run(&mut self) -> Result<()> {
        if self.handler.is_none() {
            return Err(SockError::NoHandler);
        }
        if !self.registry.is_listening() {
            self.open()?;
        }

        loop {
            if self.poll() == 0 {
                if let Some(pause) = self.config.idle_sleep {
                    thread::sleep(pause);
                }
            }
        }
    }

    /// One pass over the listener and every connection.
    ///
    /// Returns the work done: connections accepted, connections that had
    /// bytes or a hangup to handle, and events delivered to the handler.
    /// Zero means the pass was idle. Errors on a single connection are
    /// reported to the handler and never stop the pass.
    pub fn poll(&mut self) -> usize {
        let mut activity = 0;

        if self.handler.is_some() && self.registry.is_listening() {
            match self.registry.accept() {
                Ok(Some(_)) => activity += 1,
                Ok(None) => {}
                Err(_e) => {
                    trace_warn!(error = %_e, "accept failed");
                }
            }
            activity += self.dispatch();
        }

        for id in self.registry.ids() {
            if !self.registry.contains(&id) {
                continue;
            }
            if self.service(&id) {
                activity += 1;
            }
            activity += self.dispatch();
        }

        activity
    }

    /// Read from one connection and route what arrived.
    ///
    /// Returns `false` when there was nothing to read.
    fn service(&mut self, id: &ConnectionId) -> bool {
        let handshaken = self.registry.is_handshaken(id).unwrap_or(false);

        match self.registry.receive(id) {
            Ok(None) => return false,
            Ok(Some(bytes)) if !handshaken => {
                if let Err(e) = self.registry.handshake(id, &bytes) {
                    trace_warn!(%id, error = %e, "handshake failed");
                    self.registry
                        .push_event(Event::Error(*id, format!("{}: {}", HANDSHAKE_FAILED, e)));
                    self.registry.close(id);
                }
            }
            Ok(Some(payload)) => {
                self.registry.push_event(Event::Data(*id, payload));
            }
            Err(SockError::ConnectionClosed) => {
                trace_debug!(%id, "peer hung up");
                self.registry.close(id);
            }
            Err(e) => {
                trace_warn!(%id, error = %e, "receive failed");
                self.registry.push_event(Event::Error(*id, e.to_string()));
                self.registry.close(id);
            }
        }
        true
    }

    /// Deliver queued events, including any raised by the handler itself
    fn dispatch(&mut self) -> usize {
        let Some(handler) = self.handler.as_mut() else {
            self.registry.clear_events();
            return 0;
        };

        let mut delivered = 0;
        while let Some(event) = self.registry.next_event() {
            event.dispatch(handler.as_mut(), &mut ServerHandle::new(&mut self.registry));
            delivered += 1;
        }
        delivered
    }

    /// Accept one pending connection and notify the handler
    pub fn accept(&mut self) -> Result<Option<ConnectionId>> {
        let accepted = self.registry.accept()?;
        self.dispatch();
        Ok(accepted)
    }

    /// Read what is available on `id` without routing it
    pub fn receive(&mut self, id: &ConnectionId) -> Result<Option<Vec<u8>>> {
        self.registry.receive(id)
    }

    pub fn send(&mut self, id: &ConnectionId, payload: &[u8]) -> Result<usize> {
        self.registry.send(id, payload)
    }

    /// Broadcast; per-connection failures go to [`Handler::on_error`]
    pub fn send_all(&mut self, payload: &[u8]) -> usize {
        let delivered = self.registry.send_all(payload);
        self.dispatch();
        delivered
    }

    pub fn close(&mut self, id: &ConnectionId) -> bool {
        let closed = self.registry.close(id);
        self.dispatch();
        closed
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.registry.ids()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_handshaken(&self, id: &ConnectionId) -> Option<bool> {
        self.registry.is_handshaken(id)
    }
}

/// Fluent builder over [`ServerConfig`]
pub struct ServerBuilder {
    config: ServerConfig,
    handler: Option<Box<dyn Handler>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            handler: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.config.max_buffer_size = size;
        self
    }

    pub fn idle_sleep(mut self, pause: std::time::Duration) -> Self {
        self.config.idle_sleep = Some(pause);
        self
    }

    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Result<Server> {
        self.config.validate()?;
        let mut server = Server::new(self.config);
        if let Some(handler) = self.handler {
            server.register_handler(handler);
        }
        Ok(server)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
