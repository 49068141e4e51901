// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Frame-level decryption of published payloads.
//!
//! [`decrypt`] turns the hex frame received from the message bus into the JSON
//! document the publisher encrypted. The pipeline is:
//!
//! 1. hex decode and split the [`Frame`] header,
//! 2. XOR the ciphertext with the ChaCha20 keystream,
//! 3. decode the plaintext as UTF-8 and parse it as JSON.
//!
//! Each stage has its own error kind (see [`crate::error`]). The function is
//! pure and safe to call concurrently.

use log::debug;

use crate::chacha;
use crate::error::{DecodeError, DecryptError};
use crate::frame::{Frame, NONCE_LEN};
use crate::key::Key;

/// Decrypt raw frame bytes to plaintext bytes without decoding them.
pub fn decrypt_frame(frame: &Frame, key: &Key) -> Vec<u8> {
    let mut plaintext = frame.ciphertext.clone();
    chacha::apply_keystream(key, &frame.nonce, frame.counter, &mut plaintext);
    plaintext
}

/// Decrypt a hex-encoded frame and parse the plaintext as JSON.
///
/// The result is whatever JSON value the publisher sent; the engine does not
/// require an object.
///
/// # Errors
///
/// - [`FormatError::InvalidHex`](crate::error::FormatError::InvalidHex) if the
///   input is not hexadecimal.
/// - [`FormatError::TooShort`](crate::error::FormatError::TooShort) if fewer
///   than 16 bytes decode.
/// - [`DecodeError::InvalidUtf8`] if the plaintext is not UTF-8.
/// - [`DecodeError::InvalidJson`] if the plaintext is not JSON.
///
/// There is no authentication tag: a wrong key or corrupted ciphertext is
/// only detected if the garbage happens to fail UTF-8 or JSON decoding.
pub fn decrypt(framed_hex: &str, key: &Key) -> Result<serde_json::Value, DecryptError> {
    let frame = Frame::from_hex(framed_hex)?;
    let plaintext = decrypt_frame(&frame, key);
    Ok(parse_plaintext(&plaintext)?)
}

/// Decode plaintext bytes as a UTF-8 JSON document.
pub fn parse_plaintext(plaintext: &[u8]) -> Result<serde_json::Value, DecodeError> {
    let text = match std::str::from_utf8(plaintext) {
        Ok(text) => text,
        Err(e) => {
            debug!("UTF-8 decode error: {}", e);
            debug!("decrypted hex: {}", hex::encode(plaintext));
            return Err(DecodeError::InvalidUtf8 {
                valid_up_to: e.valid_up_to(),
            });
        }
    };
    debug!("decrypted message: {}", text);

    serde_json::from_str(text).map_err(|e| {
        debug!("JSON decode error: {}", e);
        DecodeError::InvalidJson {
            detail: e.to_string(),
        }
    })
}

/// Encrypt `plaintext` into a lowercase hex frame.
///
/// This is the publisher side of [`decrypt`]. Callers are responsible for
/// never reusing a `(nonce, counter)` range under the same key.
pub fn encrypt(plaintext: &[u8], key: &Key, nonce: [u8; NONCE_LEN], counter: u64) -> String {
    let mut ciphertext = plaintext.to_vec();
    chacha::apply_keystream(key, &nonce, counter, &mut ciphertext);
    Frame {
        nonce,
        counter,
        ciphertext,
    }
    .to_hex()
}
