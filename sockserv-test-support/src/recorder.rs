//! Handler that records every callback.

use std::sync::Arc;

use parking_lot::Mutex;

use sockserv::{ConnectionId, Handler, ServerHandle};

/// One recorded callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Registered,
    Open(ConnectionId),
    Data(ConnectionId, Vec<u8>),
    Error(ConnectionId, String),
    Close(ConnectionId),
}

/// Shared view of the calls a [`RecordingHandler`] has seen
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Calls concerning `id`, in order
    pub fn for_id(&self, id: &ConnectionId) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.id() == Some(id))
            .cloned()
            .collect()
    }

    pub fn errors(&self) -> Vec<(ConnectionId, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Error(id, message) => Some((*id, message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn data(&self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Data(id, payload) => Some((*id, payload.clone())),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl Call {
    pub fn id(&self) -> Option<&ConnectionId> {
        match self {
            Self::Registered => None,
            Self::Open(id) | Self::Data(id, _) | Self::Error(id, _) | Self::Close(id) => Some(id),
        }
    }
}

/// What the handler does with incoming data besides recording it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reply {
    #[default]
    Nothing,
    /// Send the payload back to its sender
    Echo,
    /// Send the payload to every connection
    Broadcast,
}

pub struct RecordingHandler {
    recorder: Recorder,
    reply: Reply,
}

impl RecordingHandler {
    pub fn new(reply: Reply) -> (Self, Recorder) {
        let recorder = Recorder::default();
        (
            Self {
                recorder: recorder.clone(),
                reply,
            },
            recorder,
        )
    }
}

impl Handler for RecordingHandler {
    fn registered(&mut self, _server: &mut ServerHandle<'_>) {
        self.recorder.push(Call::Registered);
    }

    fn on_open(&mut self, _server: &mut ServerHandle<'_>, id: &ConnectionId) {
        self.recorder.push(Call::Open(*id));
    }

    fn on_data(&mut self, server: &mut ServerHandle<'_>, id: &ConnectionId, payload: &[u8]) {
        self.recorder.push(Call::Data(*id, payload.to_vec()));
        match self.reply {
            Reply::Nothing => {}
            Reply::Echo => {
                let _ = server.send(id, payload);
            }
            Reply::Broadcast => {
                server.send_all(payload);
            }
        }
    }

    fn on_error(&mut self, _server: &mut ServerHandle<'_>, id: &ConnectionId, message: &str) {
        self.recorder.push(Call::Error(*id, message.to_string()));
    }

    fn on_close(&mut self, _server: &mut ServerHandle<'_>, id: &ConnectionId) {
        self.recorder.push(Call::Close(*id));
    }
}
