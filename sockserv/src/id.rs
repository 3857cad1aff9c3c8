//! Connection identifiers.

use std::fmt;
use std::str::FromStr;

/// Random bytes per identifier (96 bits)
pub const ID_LEN: usize = 12;

/// Opaque identifier for one accepted connection.
///
/// Generated from 96 random bits at accept time and rendered as 24 lowercase
/// hex characters. The registry never hands out an identifier that is
/// currently in use.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId([u8; ID_LEN]);

impl ConnectionId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self::from_bytes(rand::random())
    }

    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self)
    }
}

/// Error returned when parsing a [`ConnectionId`] from text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError;

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {} hex characters", ID_LEN * 2)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for ConnectionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ID_LEN * 2 || !s.is_ascii() {
            return Err(ParseIdError);
        }
        let mut bytes = [0u8; ID_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| ParseIdError)?;
        }
        Ok(Self::from_bytes(bytes))
    }
}
