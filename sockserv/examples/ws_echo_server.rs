//! WebSocket echo server example.
//!
//! Run with: cargo run --example ws_echo_server --features tracing
//! Test with: websocat ws://127.0.0.1:9000
//!
//! `SOCKET_HOST`, `SOCKET_PORT` and `SOCKET_BUFFER_SIZE` override the
//! defaults; `RUST_LOG=debug` shows connection events.

use std::time::Duration;

use sockserv::{ConnectionId, Handler, Server, ServerConfig, ServerHandle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

struct Echo;

impl Handler for Echo {
    fn on_open(&mut self, _server: &mut ServerHandle<'_>, id: &ConnectionId) {
        tracing::info!(%id, "client connected");
    }

    fn on_data(&mut self, server: &mut ServerHandle<'_>, id: &ConnectionId, payload: &[u8]) {
        tracing::info!(%id, bytes = payload.len(), "echoing");
        if let Err(e) = server.send(id, payload) {
            tracing::warn!(%id, error = %e, "echo failed");
        }
    }

    fn on_error(&mut self, _server: &mut ServerHandle<'_>, id: &ConnectionId, message: &str) {
        tracing::warn!(%id, message, "client error");
    }

    fn on_close(&mut self, _server: &mut ServerHandle<'_>, id: &ConnectionId) {
        tracing::info!(%id, "client disconnected");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(true))
        .init();

    let mut config = ServerConfig::from_env()?;
    config.idle_sleep = Some(Duration::from_millis(1));

    let mut server = Server::new(config);
    server.register_handler(Box::new(Echo));

    let addr = server.open()?;
    tracing::info!("WebSocket echo server listening on ws://{}", addr);

    server.run()?;
    Ok(())
}
