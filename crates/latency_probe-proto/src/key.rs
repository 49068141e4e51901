// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Length of a [`Key`] in bytes.
pub const KEY_LEN: usize = 32;

/// A 256-bit ChaCha20 key.
///
/// Loaded once at startup (usually from a hex string in the environment) and
/// shared read-only for the lifetime of the process. The `Debug` impl never
/// prints key material.
#[derive(Clone, Eq, PartialEq)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Key(bytes)
    }

    /// Parse a key from 64 hexadecimal characters (case-insensitive).
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|e| KeyError::InvalidHex {
            detail: e.to_string(),
        })?;
        let arr: [u8; KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::WrongLength { len: bytes.len() })?;
        Ok(Key(arr))
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(<redacted>)")
    }
}

/// Errors from [`Key::from_hex`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeyError {
    /// The string is not valid hexadecimal.
    InvalidHex {
        /// Decoder message.
        detail: String,
    },
    /// The decoded key is not 32 bytes.
    WrongLength {
        /// Number of decoded bytes.
        len: usize,
    },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::InvalidHex { detail } => write!(f, "key is not valid hex: {detail}"),
            KeyError::WrongLength { len } => {
                write!(f, "key must be {KEY_LEN} bytes, got {len}")
            }
        }
    }
}

impl std::error::Error for KeyError {}
