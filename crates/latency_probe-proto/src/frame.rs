// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Hex wire framing.
//!
//! ```text
//!  0                   8                  16                      16+N
//! +-------------------+-------------------+-------------------------+
//! |   nonce (8 B)     | counter (8 B, LE) |    ciphertext (N B)     |
//! +-------------------+-------------------+-------------------------+
//! ```
//!
//! The whole frame is transmitted as a hex string (either case).

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// Length of the nonce field in bytes.
pub const NONCE_LEN: usize = 8;

/// Length of the nonce plus counter header in bytes.
pub const HEADER_LEN: usize = 16;

/// A decoded frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    /// 64-bit nonce.
    pub nonce: [u8; NONCE_LEN],
    /// Initial block counter.
    pub counter: u64,
    /// Ciphertext bytes following the header.
    pub ciphertext: Vec<u8>,
}

impl Frame {
    /// Decode a hex string into a frame.
    pub fn from_hex(s: &str) -> Result<Self, FormatError> {
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }

    /// Split raw frame bytes into header fields and ciphertext.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::TooShort { len: bytes.len() });
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);
        let counter = LittleEndian::read_u64(&bytes[NONCE_LEN..HEADER_LEN]);
        Ok(Frame {
            nonce,
            counter,
            ciphertext: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Serialize the frame back to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        buf.extend_from_slice(&self.nonce);
        let mut counter = [0u8; 8];
        LittleEndian::write_u64(&mut counter, self.counter);
        buf.extend_from_slice(&counter);
        buf.extend_from_slice(&self.ciphertext);
        buf
    }

    /// Serialize the frame to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}
