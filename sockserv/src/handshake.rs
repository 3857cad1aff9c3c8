//! WebSocket upgrade handshake.
//!
//! The first bytes a client sends are its HTTP upgrade request. The server
//! answers with a literal `101` response carrying the accept key derived
//! from `Sec-WebSocket-Key`. The response text is kept byte-for-byte stable
//! since simple clients match it exactly.

use std::collections::HashMap;
use std::io::Write;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha1::{Digest, Sha1};

use crate::error::{Result, SockError};

/// Fixed GUID appended to the client key before hashing
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Header carrying the client nonce. Matched case-sensitively.
pub const SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";

/// Parse `Name: Value` lines from a raw request.
///
/// Lines are split on CRLF and right-trimmed. A line counts as a header when
/// it has a non-empty name without whitespace followed by `": "`. Everything
/// else (request line, blank lines, garbage) is skipped. Names keep the case
/// they were sent with; a repeated name keeps the last value.
pub fn parse_headers(request: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();

    for line in request.split("\r\n") {
        let line = line.trim_end();
        let Some((name, value)) = line.split_once(": ") else {
            continue;
        };
        if name.is_empty() || name.contains(char::is_whitespace) {
            continue;
        }
        headers.insert(name.to_string(), value.to_string());
    }

    headers
}

/// `base64(sha1(client_key + GUID))`
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Build the `101` response for a given accept key.
pub fn response(accept_key: &str, host: &str, port: u16) -> String {
    format!(
        "HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         WebSocket-Origin: {host}\r\n\
         WebSocket-Location: ws://{host}:{port}\r\n\
         Sec-WebSocket-Accept:{accept_key}\r\n\r\n"
    )
}

/// Answer a client upgrade request.
///
/// Fails with [`SockError::MissingKey`] when the request has no
/// `Sec-WebSocket-Key`, and with [`SockError::HandshakeWrite`] or
/// [`SockError::ShortWrite`] when the response cannot be written in one
/// call. Only `Ok` means the connection may be marked handshaken.
pub fn negotiate<W: Write>(stream: &mut W, request: &[u8], host: &str, port: u16) -> Result<()> {
    let request = String::from_utf8_lossy(request);
    let headers = parse_headers(&request);

    let client_key = headers
        .get(SEC_WEBSOCKET_KEY)
        .ok_or(SockError::MissingKey)?;

    let reply = response(&accept_key(client_key), host, port);
    let written = stream
        .write(reply.as_bytes())
        .map_err(SockError::HandshakeWrite)?;

    if written != reply.len() {
        return Err(SockError::ShortWrite {
            written,
            expected: reply.len(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    const REQUEST: &str = "GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn test_rfc_accept_key() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(REQUEST);
        assert_eq!(headers.len(), 5);
        assert_eq!(headers["Host"], "server.example.com");
        assert_eq!(headers["Sec-WebSocket-Key"], "dGhlIHNhbXBsZSBub25jZQ==");
        assert!(!headers.contains_key("GET /chat HTTP/1.1"));
    }

    #[test]
    fn test_parse_headers_keeps_case() {
        let headers = parse_headers("sec-websocket-key: abc\r\n");
        assert!(headers.contains_key("sec-websocket-key"));
        assert!(!headers.contains_key(SEC_WEBSOCKET_KEY));
    }

    #[test]
    fn test_parse_headers_skips_malformed_lines() {
        let headers = parse_headers("NoSeparator\r\nBad Name: x\r\n: empty\r\nTight:value\r\nOk: yes  \r\n");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["Ok"], "yes");
    }

    #[test]
    fn test_parse_headers_last_wins() {
        let headers = parse_headers("X-Dup: one\r\nX-Dup: two\r\n");
        assert_eq!(headers["X-Dup"], "two");
    }

    #[test]
    fn test_negotiate_writes_exact_response() {
        let mut out = Vec::new();
        negotiate(&mut out, REQUEST.as_bytes(), "0.0.0.0", 9000).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "HTTP/1.1 101 Web Socket Protocol Handshake\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             WebSocket-Origin: 0.0.0.0\r\n\
             WebSocket-Location: ws://0.0.0.0:9000\r\n\
             Sec-WebSocket-Accept:s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
        );
    }

    #[test]
    fn test_negotiate_missing_key() {
        let mut out = Vec::new();
        let request = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        assert!(matches!(
            negotiate(&mut out, request, "0.0.0.0", 9000),
            Err(SockError::MissingKey)
        ));
        assert!(out.is_empty());
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "severed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ShortWriter;

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len() / 2)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_negotiate_write_failure() {
        assert!(matches!(
            negotiate(&mut FailingWriter, REQUEST.as_bytes(), "h", 1),
            Err(SockError::HandshakeWrite(_))
        ));
    }

    #[test]
    fn test_negotiate_short_write() {
        assert!(matches!(
            negotiate(&mut ShortWriter, REQUEST.as_bytes(), "h", 1),
            Err(SockError::ShortWrite { .. })
        ));
    }
}
