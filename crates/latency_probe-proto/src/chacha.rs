// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Minimal ChaCha20 keystream generator (original 64-bit nonce / 64-bit counter layout).
//!
//! The publisher firmware encrypts with the djb variant of ChaCha20: state
//! words 12 and 13 hold a 64-bit block counter and words 14 and 15 hold an
//! 8-byte nonce. This module implements exactly that layout, with no AEAD tag.
//!
//! **No authentication.** A corrupted or forged ciphertext decrypts to
//! garbage without error; integrity is the job of the transport.

use byteorder::{ByteOrder, LittleEndian};

use crate::frame::NONCE_LEN;
use crate::key::Key;

/// Keystream block size in bytes.
pub const BLOCK_LEN: usize = 64;

/// "expand 32-byte k" as four little-endian words.
pub const SIGMA: [u32; 4] = [0x61707865, 0x3320646E, 0x79622D32, 0x6B206574];

// Number of double rounds (20 rounds total).
const DOUBLE_ROUNDS: usize = 10;

#[inline(always)]
fn quarter_round(s: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    s[a] = s[a].wrapping_add(s[b]);
    s[d] = (s[d] ^ s[a]).rotate_left(16);

    s[c] = s[c].wrapping_add(s[d]);
    s[b] = (s[b] ^ s[c]).rotate_left(12);

    s[a] = s[a].wrapping_add(s[b]);
    s[d] = (s[d] ^ s[a]).rotate_left(8);

    s[c] = s[c].wrapping_add(s[d]);
    s[b] = (s[b] ^ s[c]).rotate_left(7);
}

/// Build the 16-word initial state for one block.
fn initial_state(key: &Key, counter: u64, nonce: &[u8; NONCE_LEN]) -> [u32; 16] {
    let mut state = [0u32; 16];
    state[..4].copy_from_slice(&SIGMA);
    LittleEndian::read_u32_into(key.as_bytes(), &mut state[4..12]);
    state[12] = counter as u32;
    state[13] = (counter >> 32) as u32;
    LittleEndian::read_u32_into(nonce, &mut state[14..16]);
    state
}

/// Compute one 64-byte keystream block.
pub fn block(key: &Key, counter: u64, nonce: &[u8; NONCE_LEN]) -> [u8; BLOCK_LEN] {
    let state = initial_state(key, counter, nonce);
    let mut working = state;

    for _ in 0..DOUBLE_ROUNDS {
        // Column round.
        quarter_round(&mut working, 0, 4, 8, 12);
        quarter_round(&mut working, 1, 5, 9, 13);
        quarter_round(&mut working, 2, 6, 10, 14);
        quarter_round(&mut working, 3, 7, 11, 15);
        // Diagonal round.
        quarter_round(&mut working, 0, 5, 10, 15);
        quarter_round(&mut working, 1, 6, 11, 12);
        quarter_round(&mut working, 2, 7, 8, 13);
        quarter_round(&mut working, 3, 4, 9, 14);
    }

    for (w, s) in working.iter_mut().zip(state.iter()) {
        *w = w.wrapping_add(*s);
    }

    let mut out = [0u8; BLOCK_LEN];
    LittleEndian::write_u32_into(&working, &mut out);
    out
}

/// XOR `data` in place with the keystream starting at block `counter`.
///
/// Block `i` of the data uses counter `counter + i` (wrapping at 2^64). The
/// last block is truncated to the remaining length. Applying the same
/// keystream twice restores the input.
pub fn apply_keystream(key: &Key, nonce: &[u8; NONCE_LEN], counter: u64, data: &mut [u8]) {
    for (i, chunk) in data.chunks_mut(BLOCK_LEN).enumerate() {
        let ks = block(key, counter.wrapping_add(i as u64), nonce);
        for (byte, k) in chunk.iter_mut().zip(ks.iter()) {
            *byte ^= k;
        }
    }
}
