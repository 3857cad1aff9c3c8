//! Connection registry: the listening socket plus every accepted connection.
//!
//! All sockets are non-blocking. Nothing here calls the handler; lifecycle
//! notifications are queued as [`Event`]s and delivered by the server once
//! the current operation finishes.

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use socket2::{Domain, Protocol, Socket, Type};

use crate::codec;
use crate::config::ServerConfig;
use crate::error::{Result, SockError};
use crate::handler::Event;
use crate::handshake;
use crate::id::ConnectionId;

/// Pending connection backlog for the listener
const LISTEN_BACKLOG: i32 = 128;

/// One accepted connection
#[derive(Debug)]
struct Connection {
    stream: TcpStream,
    handshake_complete: bool,
}

/// Accepted connections keyed by identifier, plus the listening socket.
///
/// Owned by the server; handlers only reach it through
/// [`ServerHandle`](crate::handler::ServerHandle).
pub(crate) struct ConnectionRegistry {
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    /// Host echoed in the handshake response
    host: String,
    connections: HashMap<ConnectionId, Connection>,
    /// Reused scratch buffer for a single read
    recv_buffer: Vec<u8>,
    events: VecDeque<Event>,
}

impl ConnectionRegistry {
    pub(crate) fn new(config: &ServerConfig) -> Self {
        Self {
            listener: None,
            local_addr: None,
            host: config.bind_addr.clone(),
            connections: HashMap::new(),
            recv_buffer: vec![0u8; config.max_buffer_size.max(1)],
            events: VecDeque::new(),
        }
    }

    /// Create, bind and listen on a non-blocking TCP socket.
    ///
    /// Failure is reported, never retried.
    pub(crate) fn open(&mut self, host: &str, port: u16) -> Result<SocketAddr> {
        let display = format!("{}:{}", host, port);
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| SockError::bind(display.clone(), e))?
            .next()
            .ok_or_else(|| SockError::invalid_address(display.clone()))?;

        let listener = bind_listener(addr).map_err(|e| SockError::bind(display, e))?;
        let local_addr = listener.local_addr()?;

        trace_debug!(%local_addr, "listening");

        self.host = host.to_string();
        self.local_addr = Some(local_addr);
        self.listener = Some(listener);
        Ok(local_addr)
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Bound address, once [`open`](Self::open) succeeded
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Accept one pending connection, if any.
    ///
    /// The new connection starts unhandshaken and an `Open` event is queued.
    pub(crate) fn accept(&mut self) -> Result<Option<ConnectionId>> {
        let listener = self.listener.as_ref().ok_or(SockError::NotListening)?;

        let (stream, _peer_addr) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        stream.set_nonblocking(true)?;

        let id = self.fresh_id();
        trace_debug!(%id, peer_addr = %_peer_addr, "connection accepted");

        self.connections.insert(
            id,
            Connection {
                stream,
                handshake_complete: false,
            },
        );
        self.events.push_back(Event::Open(id));
        Ok(Some(id))
    }

    fn fresh_id(&self) -> ConnectionId {
        loop {
            let id = ConnectionId::generate();
            if !self.connections.contains_key(&id) {
                return id;
            }
        }
    }

    /// Drain every byte currently readable on `id`.
    ///
    /// Before the handshake the raw bytes are returned; afterwards they are
    /// decoded as one masked frame. `Ok(None)` means nothing was available.
    /// A peer that hung up with nothing left to read yields
    /// [`SockError::ConnectionClosed`].
    pub(crate) fn receive(&mut self, id: &ConnectionId) -> Result<Option<Vec<u8>>> {
        let Self {
            connections,
            recv_buffer,
            ..
        } = self;
        let conn = connections
            .get_mut(id)
            .ok_or_else(|| SockError::unknown_connection(id))?;

        let mut message = Vec::new();
        let mut eof = false;
        loop {
            match conn.stream.read(recv_buffer) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => message.extend_from_slice(&recv_buffer[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if message.is_empty() {
            return if eof {
                Err(SockError::ConnectionClosed)
            } else {
                Ok(None)
            };
        }

        if conn.handshake_complete {
            codec::unmask(&message).map(Some)
        } else {
            Ok(Some(message))
        }
    }

    /// Answer the upgrade request read from `id` and mark it handshaken.
    ///
    /// The flag only flips after the whole `101` response was written.
    pub(crate) fn handshake(&mut self, id: &ConnectionId, request: &[u8]) -> Result<()> {
        let port = self.local_addr.map(|addr| addr.port()).unwrap_or_default();
        let conn = self
            .connections
            .get_mut(id)
            .ok_or_else(|| SockError::unknown_connection(id))?;

        handshake::negotiate(&mut conn.stream, request, &self.host, port)?;
        conn.handshake_complete = true;

        trace_debug!(%id, "handshake complete");
        Ok(())
    }

    /// Write `payload` to `id`, framed if the handshake is done.
    ///
    /// One write call, no retry. Returns the bytes written, which can be
    /// fewer than the frame length.
    pub(crate) fn send(&mut self, id: &ConnectionId, payload: &[u8]) -> Result<usize> {
        let conn = self
            .connections
            .get_mut(id)
            .ok_or_else(|| SockError::unknown_connection(id))?;

        let bytes = if conn.handshake_complete {
            Cow::Owned(codec::frame(payload))
        } else {
            Cow::Borrowed(payload)
        };

        let written = conn.stream.write(&bytes)?;
        if written == 0 && !bytes.is_empty() {
            return Err(io::Error::from(io::ErrorKind::WriteZero).into());
        }
        Ok(written)
    }

    /// Send `payload` to every connection.
    ///
    /// A failed send queues an `Error` event for that connection and the
    /// broadcast carries on. Returns how many sends succeeded.
    pub(crate) fn send_all(&mut self, payload: &[u8]) -> usize {
        let mut delivered = 0;
        for id in self.ids() {
            match self.send(&id, payload) {
                Ok(_) => delivered += 1,
                Err(e) => {
                    trace_warn!(%id, error = %e, "broadcast send failed");
                    self.events
                        .push_back(Event::Error(id, format!("Message could not be sent: {}", e)));
                }
            }
        }
        delivered
    }

    /// Close `id`, drop it from the registry and queue a `Close` event.
    ///
    /// Returns `false` (and queues nothing) when `id` is already gone.
    pub(crate) fn close(&mut self, id: &ConnectionId) -> bool {
        let Some(conn) = self.connections.remove(id) else {
            return false;
        };
        let _ = conn.stream.shutdown(Shutdown::Both);
        drop(conn);

        trace_debug!(%id, "connection closed");
        self.events.push_back(Event::Close(*id));
        true
    }

    /// Snapshot of the current identifiers
    pub(crate) fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// `Some(handshaken)` for a known connection
    pub(crate) fn is_handshaken(&self, id: &ConnectionId) -> Option<bool> {
        self.connections.get(id).map(|conn| conn.handshake_complete)
    }

    pub(crate) fn push_event(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub(crate) fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Drop every queued event
    pub(crate) fn clear_events(&mut self) {
        self.events.clear();
    }

    #[cfg(test)]
    pub(crate) fn stream(&self, id: &ConnectionId) -> Option<&TcpStream> {
        self.connections.get(id).map(|conn| &conn.stream)
    }
}

fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}
