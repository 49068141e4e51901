// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Minimal SNTP packet handling.
//!
//! The probe only needs the server's transmit time in whole seconds, so the
//! request is the classic fixed SNTP client packet (LI = 0, VN = 3,
//! Mode = 3, everything else zero) and the response is read as twelve
//! big-endian 32-bit words without further validation.
//!
//! ```text
//! word  0: LI | VN | Mode | Stratum | Poll | Precision
//! word  1: Root Delay
//! word  2: Root Dispersion
//! word  3: Reference ID
//! words 4-5: Reference Timestamp
//! words 6-7: Origin Timestamp
//! words 8-9: Receive Timestamp
//! words 10-11: Transmit Timestamp (seconds, fraction)
//! ```

use byteorder::{BigEndian, ByteOrder};

use crate::error::ParseError;

/// NTP port number.
pub const PORT: u16 = 123;

/// Size of an NTP header without extension fields.
pub const PACKED_SIZE_BYTES: usize = 48;

/// First byte of a client request: LI = 0, VN = 3, Mode = 3 (client).
pub const CLIENT_REQUEST_FLAGS: u8 = 0x1B;

/// Index of the transmit timestamp seconds word.
pub const TRANSMIT_SECONDS_WORD: usize = 10;

/// Build the 48-byte SNTP client request.
pub fn client_request() -> [u8; PACKED_SIZE_BYTES] {
    let mut buf = [0u8; PACKED_SIZE_BYTES];
    buf[0] = CLIENT_REQUEST_FLAGS;
    buf
}

/// Read the header of a response as twelve big-endian words.
///
/// Bytes past the 48-byte header (extension fields, MAC) are ignored.
pub fn read_words(buf: &[u8]) -> Result<[u32; 12], ParseError> {
    if buf.len() < PACKED_SIZE_BYTES {
        return Err(ParseError::BufferTooShort {
            needed: PACKED_SIZE_BYTES,
            available: buf.len(),
        });
    }
    let mut words = [0u32; 12];
    BigEndian::read_u32_into(&buf[..PACKED_SIZE_BYTES], &mut words);
    Ok(words)
}

/// Extract the transmit timestamp seconds (NTP era 0) from a response.
pub fn transmit_seconds(buf: &[u8]) -> Result<u32, ParseError> {
    Ok(read_words(buf)?[TRANSMIT_SECONDS_WORD])
}

/// Build a 48-byte server reply carrying the given transmit seconds.
///
/// Only used by tests and local mock servers; the probe never answers
/// requests.
pub fn server_reply(transmit_seconds: u32) -> [u8; PACKED_SIZE_BYTES] {
    let mut words = [0u32; 12];
    // LI = 0, VN = 3, Mode = 4 (server), stratum 1.
    words[0] = 0x1C01_0000;
    words[TRANSMIT_SECONDS_WORD] = transmit_seconds;
    let mut buf = [0u8; PACKED_SIZE_BYTES];
    BigEndian::write_u32_into(&words, &mut buf);
    buf
}
