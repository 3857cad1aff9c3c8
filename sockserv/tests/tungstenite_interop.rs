//! Interop with a stock client: tungstenite must accept the handshake and
//! the unmasked frames, and the server must decode tungstenite's masked ones.

use std::thread;
use std::time::Duration;

use sockserv_test_support::{recording_server, Call, Reply};
use tungstenite::Message;

#[test]
fn test_tungstenite_client_echo() {
    let (mut server, recorder) = recording_server(Reply::Echo);
    let addr = server.local_addr().unwrap();

    let long = "x".repeat(300);
    let messages = vec!["hello".to_string(), "from tungstenite".to_string(), long];
    let to_send = messages.clone();

    let client = thread::spawn(move || {
        let (mut ws, response) = tungstenite::connect(format!("ws://{}", addr)).unwrap();
        assert_eq!(response.status().as_u16(), 101);

        let mut echoes = Vec::new();
        for text in to_send {
            ws.send(Message::text(text)).unwrap();
            let reply = ws.read().unwrap();
            echoes.push(reply.to_text().unwrap().to_string());
        }
        echoes
    });

    while !client.is_finished() {
        server.poll();
        thread::sleep(Duration::from_millis(1));
    }
    let echoes = client.join().unwrap();
    assert_eq!(echoes, messages);

    let data: Vec<Vec<u8>> = recorder.data().into_iter().map(|(_, payload)| payload).collect();
    let expected: Vec<Vec<u8>> = messages.iter().map(|m| m.as_bytes().to_vec()).collect();
    assert_eq!(data, expected);
    assert!(recorder.errors().is_empty());
}

#[test]
fn test_tungstenite_client_disconnect() {
    let (mut server, recorder) = recording_server(Reply::Nothing);
    let addr = server.local_addr().unwrap();

    let client = thread::spawn(move || {
        let (ws, _) = tungstenite::connect(format!("ws://{}", addr)).unwrap();
        drop(ws);
    });

    while !client.is_finished() {
        server.poll();
        thread::sleep(Duration::from_millis(1));
    }
    client.join().unwrap();

    sockserv_test_support::poll_until(&mut server, |s| s.connection_count() == 0);
    let calls = recorder.calls();
    assert!(matches!(calls[1], Call::Open(_)));
    assert!(matches!(calls.last(), Some(Call::Close(_))));
    assert!(recorder.errors().is_empty());
}
