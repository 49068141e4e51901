// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Wire framing, ChaCha20 keystream, and SNTP packet helpers for the latency probe.
//!
//! This crate provides the pure, allocation-light building blocks shared by the
//! probe client: decoding the hex frame published on the message bus,
//! generating the ChaCha20 keystream that recovers the JSON payload, and
//! building/parsing the 48-byte SNTP exchange used to correct the local clock.
//!
//! # Example
//!
//! ```
//! use latency_proto::cipher;
//! use latency_proto::key::Key;
//!
//! let key = Key::from_bytes([7u8; 32]);
//! let framed = cipher::encrypt(br#"{"iteration":3}"#, &key, [1u8; 8], 0);
//! let payload = cipher::decrypt(&framed, &key).unwrap();
//! assert_eq!(payload["iteration"], 3);
//! ```

#![warn(missing_docs)]

/// Error types for frame decoding and payload decryption.
pub mod error;

/// The 256-bit symmetric key shared by publisher and probe.
pub mod key;

/// Hex wire framing: nonce, little-endian block counter, ciphertext.
pub mod frame;

/// ChaCha20 block function and keystream application.
pub mod chacha;

/// Frame-level decrypt/encrypt producing and consuming JSON payloads.
pub mod cipher;

/// Minimal SNTP request/response handling (RFC 4330 unicast client).
pub mod protocol;

/// Unix time conversion utilities: NTP era offset, epoch floats, ISO-8601.
pub mod unix_time;
