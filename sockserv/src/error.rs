//! Error types for sockserv.

use thiserror::Error;

use crate::id::ConnectionId;

pub type Result<T> = std::result::Result<T, SockError>;

#[derive(Error, Debug)]
pub enum SockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not bind/listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No handler registered")]
    NoHandler,

    #[error("Server is not listening")]
    NotListening,

    #[error("Unknown connection: {id}")]
    UnknownConnection { id: ConnectionId },

    #[error("Missing Sec-WebSocket-Key header")]
    MissingKey,

    #[error("Handshake response could not be written: {0}")]
    HandshakeWrite(#[source] std::io::Error),

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Frame error: {reason}")]
    Frame { reason: String },

    #[error("Connection closed")]
    ConnectionClosed,
}

impl SockError {
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    pub fn invalid_address(addr: impl Into<String>) -> Self {
        Self::InvalidAddress(addr.into())
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    pub fn unknown_connection(id: &ConnectionId) -> Self {
        Self::UnknownConnection { id: *id }
    }

    pub fn frame(reason: impl Into<String>) -> Self {
        Self::Frame {
            reason: reason.into(),
        }
    }
}
