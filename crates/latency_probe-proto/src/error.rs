// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for frame decoding, payload decryption, and SNTP parsing.
//!
//! Decryption failures are split into two families so that callers can branch
//! on the kind without inspecting messages:
//!
//! - [`FormatError`]: the hex frame itself is malformed.
//! - [`DecodeError`]: the frame decrypted, but the plaintext is not a UTF-8
//!   JSON document (usually a wrong key or a corrupted ciphertext).
//!
//! Both are carried by [`DecryptError`], the error type of
//! [`cipher::decrypt`](crate::cipher::decrypt).

use std::fmt;

/// The framed ciphertext could not be decoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FormatError {
    /// Input is not valid hexadecimal (bad digit or odd length).
    InvalidHex {
        /// Description of the offending character or length.
        detail: String,
    },
    /// Decoded frame is shorter than the 16-byte header.
    TooShort {
        /// Number of decoded bytes.
        len: usize,
    },
}

/// The decrypted bytes are not a UTF-8 JSON document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// Plaintext is not valid UTF-8.
    InvalidUtf8 {
        /// Byte offset of the first invalid sequence.
        valid_up_to: usize,
    },
    /// Plaintext is UTF-8 but does not parse as JSON.
    InvalidJson {
        /// Parser message, including line and column.
        detail: String,
    },
}

/// Errors returned by [`cipher::decrypt`](crate::cipher::decrypt).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecryptError {
    /// Malformed hex or undersized frame.
    Format(FormatError),
    /// Plaintext is not UTF-8 JSON.
    Decode(DecodeError),
}

impl DecryptError {
    /// A stable, machine-readable tag naming the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DecryptError::Format(FormatError::InvalidHex { .. }) => "InvalidHex",
            DecryptError::Format(FormatError::TooShort { .. }) => "TooShort",
            DecryptError::Decode(DecodeError::InvalidUtf8 { .. }) => "InvalidUtf8",
            DecryptError::Decode(DecodeError::InvalidJson { .. }) => "InvalidJson",
        }
    }
}

/// Errors that can occur while parsing an SNTP response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// The buffer is too short for the expected data.
    BufferTooShort {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        available: usize,
    },
}

// ── Display implementations ─────────────────────────────────────────

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::InvalidHex { detail } => write!(f, "invalid hex string format: {detail}"),
            FormatError::TooShort { len } => write!(
                f,
                "encrypted message too short: {len} bytes, minimum {} required",
                crate::frame::HEADER_LEN
            ),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidUtf8 { valid_up_to } => write!(
                f,
                "failed to decode decrypted bytes as UTF-8: invalid sequence at byte {valid_up_to}"
            ),
            DecodeError::InvalidJson { detail } => {
                write!(f, "failed to parse decrypted message as JSON: {detail}")
            }
        }
    }
}

impl fmt::Display for DecryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecryptError::Format(e) => write!(f, "{e}"),
            DecryptError::Decode(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BufferTooShort { needed, available } => {
                write!(
                    f,
                    "buffer too short: needed {} bytes, got {}",
                    needed, available
                )
            }
        }
    }
}

// ── Error trait implementations ─────────────────────────────────────

impl std::error::Error for FormatError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for ParseError {}

impl std::error::Error for DecryptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecryptError::Format(e) => Some(e),
            DecryptError::Decode(e) => Some(e),
        }
    }
}

// ── From conversions ────────────────────────────────────────────────

impl From<FormatError> for DecryptError {
    fn from(err: FormatError) -> DecryptError {
        DecryptError::Format(err)
    }
}

impl From<DecodeError> for DecryptError {
    fn from(err: DecodeError) -> DecryptError {
        DecryptError::Decode(err)
    }
}

impl From<hex::FromHexError> for FormatError {
    fn from(err: hex::FromHexError) -> FormatError {
        FormatError::InvalidHex {
            detail: err.to_string(),
        }
    }
}

impl From<ParseError> for std::io::Error {
    fn from(err: ParseError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
