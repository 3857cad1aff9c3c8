//! Blocking raw WebSocket client speaking the server's exact wire format.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use rand::Rng;
use socket2::SockRef;

use sockserv::codec;

/// Nonce from RFC 6455, answered with `s3pPLMBiTxaQ9kYGzzhZRbK+xOo=`
pub const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

/// Client socket with a read timeout, so a stuck test fails instead of hanging
pub struct RawClient {
    stream: TcpStream,
}

impl RawClient {
    pub fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(2)))?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Upgrade request carrying `key`, or no key at all
    pub fn upgrade_request(key: Option<&str>) -> String {
        let mut request = String::from(
            "GET /socket HTTP/1.1\r\n\
             Host: localhost\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Version: 13\r\n",
        );
        if let Some(key) = key {
            request.push_str(&format!("Sec-WebSocket-Key: {}\r\n", key));
        }
        request.push_str("\r\n");
        request
    }

    pub fn send_request(&mut self, key: Option<&str>) -> io::Result<()> {
        self.send_raw(Self::upgrade_request(key).as_bytes())
    }

    /// Read the handshake response up to and including the blank line.
    ///
    /// Byte by byte, so no frame data is swallowed.
    pub fn read_response(&mut self) -> io::Result<String> {
        let mut resp = Vec::new();
        let mut byte = [0u8; 1];
        while !resp.ends_with(b"\r\n\r\n") {
            self.stream.read_exact(&mut byte)?;
            resp.push(byte[0]);
        }
        String::from_utf8(resp).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    /// Send `payload` as one masked frame under a random key
    pub fn send_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        let key: [u8; 4] = rand::thread_rng().gen();
        self.send_raw(&codec::mask_frame(payload, key))
    }

    /// Read one unmasked server frame and return its payload
    pub fn read_frame(&mut self) -> io::Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.stream.read_exact(&mut header)?;
        if header[0] != codec::FIRST_BYTE || header[1] & 0x80 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected header {:02x} {:02x}", header[0], header[1]),
            ));
        }

        let len = match header[1] {
            codec::LEN_16 => {
                let mut ext = [0u8; 2];
                self.stream.read_exact(&mut ext)?;
                u16::from_be_bytes(ext) as usize
            }
            codec::LEN_64 => {
                let mut ext = [0u8; 8];
                self.stream.read_exact(&mut ext)?;
                u64::from_be_bytes(ext) as usize
            }
            short => short as usize,
        };

        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Abort the connection with a reset instead of a clean FIN.
    ///
    /// Writes from the server side fail once the reset has landed.
    pub fn sever(self) -> io::Result<()> {
        SockRef::from(&self.stream).set_linger(Some(Duration::ZERO))?;
        drop(self.stream);
        Ok(())
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}
