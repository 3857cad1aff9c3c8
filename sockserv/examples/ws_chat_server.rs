//! Broadcast chat server example.
//!
//! Every message is relayed to all connected clients, prefixed with the
//! sender's id. `/quit` closes the sender's connection.
//!
//! Run with: cargo run --example ws_chat_server --features tracing

use std::collections::HashSet;
use std::time::Duration;

use sockserv::{ConnectionId, Handler, ServerBuilder, ServerHandle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Default)]
struct Chat {
    /// Clients that have spoken at least once, so are known to be handshaken
    members: HashSet<ConnectionId>,
}

impl Chat {
    fn announce(&self, server: &mut ServerHandle<'_>, text: &str) {
        for id in &self.members {
            let _ = server.send(id, text.as_bytes());
        }
    }
}

impl Handler for Chat {
    fn registered(&mut self, server: &mut ServerHandle<'_>) {
        tracing::info!(local_addr = ?server.local_addr(), "chat handler registered");
    }

    fn on_data(&mut self, server: &mut ServerHandle<'_>, id: &ConnectionId, payload: &[u8]) {
        if self.members.insert(*id) {
            self.announce(server, &format!("* {} joined", id));
        }

        let text = String::from_utf8_lossy(payload);
        if text.trim() == "/quit" {
            server.close(id);
            return;
        }
        self.announce(server, &format!("{}: {}", id, text));
    }

    fn on_error(&mut self, _server: &mut ServerHandle<'_>, id: &ConnectionId, message: &str) {
        tracing::warn!(%id, message, "chat error");
    }

    fn on_close(&mut self, server: &mut ServerHandle<'_>, id: &ConnectionId) {
        if self.members.remove(id) {
            self.announce(server, &format!("* {} left", id));
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let mut server = ServerBuilder::new()
        .bind("127.0.0.1")
        .port(9001)
        .idle_sleep(Duration::from_millis(1))
        .handler(Chat::default())
        .build()?;

    let addr = server.open()?;
    tracing::info!("chat server listening on ws://{}", addr);
    server.run()?;
    Ok(())
}
