use latency_proto::chacha;
use latency_proto::cipher;
use latency_proto::error::{DecodeError, DecryptError, FormatError};
use latency_proto::key::Key;

const ZERO_KEY_BLOCK_0: &str = "76b8e0ada0f13d90405d6ae55386bd28bdd219b8a08ded1aa836efcc8b770dc7\
                                da41597c5157488d7724e03fb8d84a376a43b8f41518a11cc387b669b2ee6586";

#[test]
fn zero_key_keystream_matches_reference() {
    let ks = chacha::block(&Key::from_bytes([0; 32]), 0, &[0; 8]);
    assert_eq!(hex::encode(ks), ZERO_KEY_BLOCK_0);
}

#[test]
fn end_to_end_reference_payload() {
    let plaintext = br#"{"iteration":1}"#;
    let keystream = hex::decode(ZERO_KEY_BLOCK_0).unwrap();
    let ciphertext: Vec<u8> = plaintext
        .iter()
        .zip(keystream.iter())
        .map(|(p, k)| p ^ k)
        .collect();

    // nonce = 8 zero bytes, counter = 0 (little-endian), then ciphertext.
    let framed = format!("{}{}", "00".repeat(16), hex::encode(&ciphertext));
    assert_eq!(framed, "000000000000000000000000000000000d9a89d9c5835ce4293204c769b7c0");

    let value = cipher::decrypt(&framed, &Key::from_bytes([0; 32])).unwrap();
    assert_eq!(value, serde_json::json!({ "iteration": 1 }));
}

#[test]
fn publisher_frame_with_timestamp() {
    let key = Key::from_hex("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f")
        .unwrap();
    let doc = r#"{"iteration":42,"timestamp":"2024-01-01T00:00:00Z","device":"esp32"}"#;
    let framed = cipher::encrypt(doc.as_bytes(), &key, *b"\x01\x02\x03\x04\x05\x06\x07\x08", 5);

    let value = cipher::decrypt(&framed, &key).unwrap();
    assert_eq!(value["iteration"], 42);
    assert_eq!(value["timestamp"], "2024-01-01T00:00:00Z");
    assert_eq!(value["device"], "esp32");
}

#[test]
fn multi_block_payload() {
    let key = Key::from_bytes([0x5A; 32]);
    let padding = "x".repeat(300);
    let doc = serde_json::json!({ "iteration": 7, "padding": padding });
    let framed = cipher::encrypt(doc.to_string().as_bytes(), &key, [0; 8], u64::MAX - 1);
    assert_eq!(cipher::decrypt(&framed, &key).unwrap(), doc);
}

#[test]
fn error_kinds_are_distinguishable() {
    let key = Key::from_bytes([0; 32]);

    let invalid_hex = cipher::decrypt("0g", &key).unwrap_err();
    assert!(matches!(
        invalid_hex,
        DecryptError::Format(FormatError::InvalidHex { .. })
    ));

    let too_short = cipher::decrypt(&"ab".repeat(15), &key).unwrap_err();
    assert_eq!(too_short, DecryptError::Format(FormatError::TooShort { len: 15 }));

    let bad_json = cipher::decrypt(&cipher::encrypt(b"{\"iteration\":", &key, [0; 8], 0), &key)
        .unwrap_err();
    assert!(matches!(
        bad_json,
        DecryptError::Decode(DecodeError::InvalidJson { .. })
    ));

    let bad_utf8 = cipher::decrypt(&cipher::encrypt(b"ok\xC3", &key, [0; 8], 0), &key).unwrap_err();
    assert_eq!(
        bad_utf8,
        DecryptError::Decode(DecodeError::InvalidUtf8 { valid_up_to: 2 })
    );
}
