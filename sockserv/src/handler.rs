//! Application-side reactor driven by the server.

use std::net::SocketAddr;

use crate::error::Result;
use crate::id::ConnectionId;
use crate::registry::ConnectionRegistry;

/// What a handler may do to the server from inside a callback.
///
/// Only outbound operations and read-only queries; accepting, reading and
/// the handshake stay with the event loop.
pub struct ServerHandle<'a> {
    registry: &'a mut ConnectionRegistry,
}

impl<'a> ServerHandle<'a> {
    pub(crate) fn new(registry: &'a mut ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Write `payload` to `id`, framed once the handshake is done
    pub fn send(&mut self, id: &ConnectionId, payload: &[u8]) -> Result<usize> {
        self.registry.send(id, payload)
    }

    /// Broadcast; failures surface as `on_error` after this callback
    pub fn send_all(&mut self, payload: &[u8]) -> usize {
        self.registry.send_all(payload)
    }

    /// Close `id`; `on_close` follows after this callback
    pub fn close(&mut self, id: &ConnectionId) -> bool {
        self.registry.close(id)
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.registry.ids()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.registry.contains(id)
    }

    pub fn is_handshaken(&self, id: &ConnectionId) -> Option<bool> {
        self.registry.is_handshaken(id)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.registry.local_addr()
    }
}

/// Reacts to connection lifecycle events.
///
/// Every callback receives a [`ServerHandle`] so the handler can answer
/// with `send`, `send_all` or `close`. Events raised by those calls (an
/// `on_error` from a failed broadcast, an `on_close`) are delivered after
/// the current callback returns, in the order they were raised.
///
/// ```rust,ignore
/// struct Echo;
///
/// impl Handler for Echo {
///     fn on_data(&mut self, server: &mut ServerHandle<'_>, id: &ConnectionId, payload: &[u8]) {
///         let _ = server.send(id, payload);
///     }
/// }
/// ```
pub trait Handler {
    /// Called once when the handler is registered with a server
    fn registered(&mut self, _server: &mut ServerHandle<'_>) {}

    /// A connection was accepted (handshake not done yet)
    fn on_open(&mut self, _server: &mut ServerHandle<'_>, _id: &ConnectionId) {}

    /// A decoded payload arrived on a handshaken connection
    fn on_data(&mut self, server: &mut ServerHandle<'_>, id: &ConnectionId, payload: &[u8]);

    fn on_error(&mut self, _server: &mut ServerHandle<'_>, _id: &ConnectionId, _message: &str) {}

    /// The connection is gone; `id` is no longer in the registry
    fn on_close(&mut self, _server: &mut ServerHandle<'_>, _id: &ConnectionId) {}
}

/// A queued lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Open(ConnectionId),
    Data(ConnectionId, Vec<u8>),
    Error(ConnectionId, String),
    Close(ConnectionId),
}

impl Event {
    /// Deliver this event to `handler`
    pub(crate) fn dispatch<H: Handler + ?Sized>(self, handler: &mut H, server: &mut ServerHandle<'_>) {
        match self {
            Self::Open(id) => handler.on_open(server, &id),
            Self::Data(id, payload) => handler.on_data(server, &id, &payload),
            Self::Error(id, message) => handler.on_error(server, &id, &message),
            Self::Close(id) => handler.on_close(server, &id),
        }
    }
}
