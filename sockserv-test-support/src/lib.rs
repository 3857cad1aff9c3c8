//! Test helpers for sockserv.
//!
//! - [`client::RawClient`]: blocking client that writes masked frames and
//!   reads the server's unmasked ones
//! - [`recorder::RecordingHandler`]: handler that logs every callback
//! - [`poll_until`]: drive a server's loop until a condition holds

pub mod client;
pub mod recorder;

use std::time::{Duration, Instant};

use sockserv::{Server, ServerBuilder};

pub use client::{RawClient, SAMPLE_KEY};
pub use recorder::{Call, Recorder, RecordingHandler, Reply};

/// Default deadline for [`poll_until`]
pub const POLL_TIMEOUT: Duration = Duration::from_secs(3);

/// Poll `server` until `done` returns true.
///
/// Panics after [`POLL_TIMEOUT`].
pub fn poll_until(server: &mut Server, mut done: impl FnMut(&Server) -> bool) {
    let deadline = Instant::now() + POLL_TIMEOUT;
    while Instant::now() < deadline {
        server.poll();
        if done(server) {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("condition not reached within {:?}", POLL_TIMEOUT);
}

/// Poll `server` a fixed number of passes
pub fn poll_for(server: &mut Server, passes: usize) {
    for _ in 0..passes {
        server.poll();
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Loopback server on an ephemeral port with a recording handler, already open
pub fn recording_server(reply: Reply) -> (Server, Recorder) {
    let (handler, recorder) = RecordingHandler::new(reply);
    let mut server = ServerBuilder::new()
        .bind("127.0.0.1")
        .port(0)
        .handler(handler)
        .build()
        .expect("valid config");
    server.open().expect("bind loopback");
    (server, recorder)
}

/// Connect a client, poll until the server accepted it and return its id
pub fn accept_client(server: &mut Server) -> (RawClient, sockserv::ConnectionId) {
    let before = server.connection_ids();
    let addr = server.local_addr().expect("server is open");
    let client = RawClient::connect(addr).expect("connect");
    poll_until(server, |s| s.connection_count() > before.len());
    let id = server
        .connection_ids()
        .into_iter()
        .find(|id| !before.contains(id))
        .expect("new connection id");
    (client, id)
}

/// Connect and complete the handshake
pub fn handshaken_client(server: &mut Server) -> (RawClient, sockserv::ConnectionId) {
    let (mut client, id) = accept_client(server);
    client.send_request(Some(SAMPLE_KEY)).expect("send request");
    poll_until(server, |s| s.is_handshaken(&id) == Some(true));
    client.read_response().expect("handshake response");
    (client, id)
}
