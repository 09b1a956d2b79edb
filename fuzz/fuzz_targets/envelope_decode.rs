//! Fuzz target for envelope parsing
//!
//! Feeds arbitrary bytes to both the wire decoder and the JSON parser.
//!
//! # Invariants
//!
//! - Decoding never panics; invalid input returns `EnvelopeError`
//! - Anything that decodes re-encodes to the exact input bytes
//! - Anything that parses from JSON survives a JSON round trip

#![no_main]

use libfuzzer_sys::fuzz_target;
use veilpost_proto::EncryptedEnvelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = EncryptedEnvelope::decode(data) {
        let encoded = envelope.to_bytes().expect("decoded envelope must re-encode");
        assert_eq!(encoded, data, "wire form is canonical");
    }

    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(envelope) = EncryptedEnvelope::from_json(text) {
            let json = envelope.to_json().expect("parsed envelope must render");
            let reparsed = EncryptedEnvelope::from_json(&json).expect("rendered JSON must parse");
            assert_eq!(reparsed, envelope);
        }
    }
});
