#![no_main]
use libfuzzer_sys::fuzz_target;
use latency_proto::cipher;
use latency_proto::key::Key;

fuzz_target!(|data: &str| {
    // Arbitrary strings must yield Ok or a typed error, never a panic.
    let _ = cipher::decrypt(data, &Key::from_bytes([0x42; 32]));
});
