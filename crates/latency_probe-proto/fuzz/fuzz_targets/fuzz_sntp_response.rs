#![no_main]
use libfuzzer_sys::fuzz_target;
use latency_proto::protocol;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the parser.
    let _ = protocol::transmit_seconds(data);
});
