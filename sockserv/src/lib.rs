//! # sockserv
//!
//! Single-threaded WebSocket server with a pluggable event handler.
//!
//! ## Features
//!
//! - **Non-blocking**: one thread polls the listener and every connection
//! - **Hand-rolled protocol**: upgrade handshake and base framing, no
//!   extensions, no TLS
//! - **Pluggable**: a [`Handler`] receives open/data/error/close and answers
//!   through a [`ServerHandle`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use sockserv::{ConnectionId, Handler, ServerBuilder, ServerHandle};
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn on_data(&mut self, server: &mut ServerHandle<'_>, id: &ConnectionId, payload: &[u8]) {
//!         let _ = server.send(id, payload);
//!     }
//! }
//!
//! let mut server = ServerBuilder::new().port(9000).handler(Echo).build()?;
//! server.run()?;
//! ```

// Tracing macros - no-op when feature disabled
#[cfg(feature = "tracing")]
macro_rules! trace_debug { ($($arg:tt)*) => { tracing::debug!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug { ($($arg:tt)*) => {} }

#[cfg(feature = "tracing")]
macro_rules! trace_warn { ($($arg:tt)*) => { tracing::warn!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn { ($($arg:tt)*) => {} }

pub mod codec;
pub mod config;
mod error;
pub mod handler;
pub mod handshake;
pub mod id;
mod registry;
pub mod server;

pub use config::ServerConfig;
pub use error::{Result, SockError};
pub use handler::{Handler, ServerHandle};
pub use id::{ConnectionId, ParseIdError};
pub use server::{Server, ServerBuilder};
