//! WebSocket base framing.
//!
//! Client frames arrive masked and are decoded with [`unmask`]; server frames
//! are written unmasked by [`frame`]. Opcodes are not interpreted: every
//! outbound frame is a final text frame (`0x81`) and inbound opcodes are
//! passed over.
//!
//! Header layout:
//!
//! ```text
//! byte 0     FIN + opcode
//! byte 1     MASK bit + 7-bit length (126 = u16 follows, 127 = u64 follows)
//! [2 | 8]    extended length, big-endian
//! [4]        mask key (client -> server only)
//! ...        payload
//! ```

use crate::error::{Result, SockError};

/// First byte of every outbound frame: FIN | text opcode
pub const FIRST_BYTE: u8 = 0x80 | 0x1;

/// Largest length that fits in the 7-bit field
pub const MAX_SHORT_LEN: usize = 125;

/// 7-bit marker for a 16-bit extended length
pub const LEN_16: u8 = 126;

/// 7-bit marker for a 64-bit extended length
pub const LEN_64: u8 = 127;

/// Mask key size
pub const MASK_LEN: usize = 4;

/// XOR `data` in place with `key`, cycling through the 4 key bytes.
///
/// Masking and unmasking are the same operation.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; MASK_LEN]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % MASK_LEN];
    }
}

/// Read the payload length starting at byte 1.
///
/// Returns `(payload_len, offset_after_length_field)`.
fn decode_length(raw: &[u8]) -> Result<(u64, usize)> {
    if raw.len() < 2 {
        return Err(SockError::frame(format!(
            "header needs 2 bytes, got {}",
            raw.len()
        )));
    }

    match raw[1] & 0x7f {
        LEN_16 => {
            let ext = raw
                .get(2..4)
                .ok_or_else(|| SockError::frame("truncated 16-bit length"))?;
            Ok((u16::from_be_bytes([ext[0], ext[1]]) as u64, 4))
        }
        LEN_64 => {
            let ext = raw
                .get(2..10)
                .ok_or_else(|| SockError::frame("truncated 64-bit length"))?;
            let mut len = [0u8; 8];
            len.copy_from_slice(ext);
            Ok((u64::from_be_bytes(len), 10))
        }
        short => Ok((short as u64, 2)),
    }
}

/// Decode one masked client frame and return its payload.
///
/// The buffer must hold the whole declared payload. Anything after it is
/// ignored: one read is treated as one frame.
pub fn unmask(raw: &[u8]) -> Result<Vec<u8>> {
    let (len, offset) = decode_length(raw)?;

    let key_bytes = raw
        .get(offset..offset + MASK_LEN)
        .ok_or_else(|| SockError::frame("missing mask key"))?;
    let key = [key_bytes[0], key_bytes[1], key_bytes[2], key_bytes[3]];

    let start = offset + MASK_LEN;
    let available = raw.len() - start;
    let len = usize::try_from(len)
        .ok()
        .filter(|&len| len <= available)
        .ok_or_else(|| {
            SockError::frame(format!(
                "declared payload of {} bytes, only {} available",
                len, available
            ))
        })?;

    if start + len < raw.len() {
        trace_warn!(
            trailing = raw.len() - start - len,
            "discarding bytes after frame payload"
        );
    }

    let mut payload = raw[start..start + len].to_vec();
    apply_mask(&mut payload, key);
    Ok(payload)
}

/// Write the header for an outbound frame of `len` bytes.
fn encode_header(out: &mut Vec<u8>, first: u8, mask_bit: u8, len: usize) {
    out.push(first);
    if len <= MAX_SHORT_LEN {
        out.push(mask_bit | len as u8);
    } else if len < 65536 {
        out.push(mask_bit | LEN_16);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | LEN_64);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
}

/// Number of header bytes [`frame`] emits for a payload of `len` bytes
pub fn header_len(len: usize) -> usize {
    if len <= MAX_SHORT_LEN {
        2
    } else if len < 65536 {
        4
    } else {
        10
    }
}

/// Frame a server-to-client payload. No mask key is written.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(header_len(payload.len()) + payload.len());
    encode_header(&mut out, FIRST_BYTE, 0, payload.len());
    out.extend_from_slice(payload);
    out
}

/// Frame a client-to-server payload, masked with `key`.
///
/// The server never sends these; clients and tests do.
pub fn mask_frame(payload: &[u8], key: [u8; MASK_LEN]) -> Vec<u8> {
    let mut out = Vec::with_capacity(header_len(payload.len()) + MASK_LEN + payload.len());
    encode_header(&mut out, FIRST_BYTE, 0x80, payload.len());
    out.extend_from_slice(&key);
    let start = out.len();
    out.extend_from_slice(payload);
    apply_mask(&mut out[start..], key);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    #[test]
    fn test_rfc_masked_hello() {
        // RFC 6455 section 5.7: single-frame masked text "Hello"
        let raw = [
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ];
        assert_eq!(unmask(&raw).unwrap(), b"Hello");
    }

    #[test]
    fn test_rfc_unmasked_hello() {
        assert_eq!(frame(b"Hello"), [0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
    }

    #[test]
    fn test_mask_roundtrip_all_branches() {
        for len in [0usize, 1, 125, 126, 65535, 65536] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            for key in [[0, 0, 0, 0], KEY, [0xff, 0x00, 0xff, 0x00]] {
                let raw = mask_frame(&payload, key);
                assert_eq!(unmask(&raw).unwrap(), payload, "len {}", len);
            }
        }
    }

    #[test]
    fn test_frame_length_branches() {
        let cases: [(usize, usize, u8); 6] = [
            (0, 2, 0),
            (1, 2, 1),
            (125, 2, 125),
            (126, 4, LEN_16),
            (65535, 4, LEN_16),
            (65536, 10, LEN_64),
        ];

        for (len, header, marker) in cases {
            let payload = vec![0x5a; len];
            let out = frame(&payload);
            assert_eq!(out[0], 0x81);
            assert_eq!(out[1], marker, "len {}", len);
            assert_eq!(out[1] & 0x80, 0, "server frames are never masked");
            assert_eq!(out.len(), header + len, "no mask key for len {}", len);
            assert_eq!(&out[header..], &payload[..]);

            match header {
                4 => assert_eq!(u16::from_be_bytes([out[2], out[3]]) as usize, len),
                10 => {
                    let mut ext = [0u8; 8];
                    ext.copy_from_slice(&out[2..10]);
                    assert_eq!(u64::from_be_bytes(ext) as usize, len);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_empty_payload_is_header_only() {
        assert_eq!(frame(b""), [0x81, 0x00]);
        assert_eq!(unmask(&mask_frame(b"", KEY)).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_apply_mask_is_self_inverse() {
        let mut data = b"some payload bytes".to_vec();
        apply_mask(&mut data, KEY);
        assert_ne!(&data[..], b"some payload bytes");
        apply_mask(&mut data, KEY);
        assert_eq!(&data[..], b"some payload bytes");
    }

    #[test]
    fn test_unmask_short_header() {
        assert!(matches!(unmask(&[]), Err(SockError::Frame { .. })));
        assert!(matches!(unmask(&[0x81]), Err(SockError::Frame { .. })));
    }

    #[test]
    fn test_unmask_truncated_extended_length() {
        assert!(unmask(&[0x81, 0xfe, 0x01]).is_err());
        assert!(unmask(&[0x81, 0xff, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_unmask_missing_mask_key() {
        assert!(unmask(&[0x81, 0x85, 0x37, 0xfa]).is_err());
    }

    #[test]
    fn test_unmask_truncated_payload() {
        let mut raw = mask_frame(b"Hello", KEY);
        raw.truncate(raw.len() - 1);
        let err = unmask(&raw).unwrap_err();
        assert!(err.to_string().contains("declared payload of 5 bytes"));
    }

    #[test]
    fn test_unmask_huge_declared_length() {
        let mut raw = vec![0x81, 0xff];
        raw.extend_from_slice(&u64::MAX.to_be_bytes());
        raw.extend_from_slice(&KEY);
        raw.extend_from_slice(b"abc");
        assert!(unmask(&raw).is_err());
    }

    #[test]
    fn test_unmask_ignores_trailing_bytes() {
        let mut raw = mask_frame(b"first", KEY);
        raw.extend_from_slice(&mask_frame(b"second", KEY));
        assert_eq!(unmask(&raw).unwrap(), b"first");
    }
}
