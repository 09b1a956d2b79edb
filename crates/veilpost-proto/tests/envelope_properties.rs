//! Property-based tests for envelope decoding
//!
//! Decoding faces untrusted bytes. These tests verify it never panics, that
//! well-formed envelopes survive both wire forms, and that any length
//! disagreement between header and buffer is rejected.

use proptest::prelude::*;
use veilpost_proto::{
    Algorithm, EncryptedEnvelope, EnvelopeError, KEM_CIPHERTEXT_SIZE, KeyExchange, KeyId,
    NONCE_SIZE, SessionId, TAG_SIZE, VERSION,
};

/// Strategy for generating either key-exchange variant
fn arbitrary_key_exchange() -> impl Strategy<Value = KeyExchange> {
    prop_oneof![
        any::<u8>().prop_map(|fill| KeyExchange::Cold {
            kem_ciphertext: Box::new([fill; KEM_CIPHERTEXT_SIZE]),
        }),
        any::<u128>().prop_map(|id| KeyExchange::Warm { session_id: SessionId::from_u128(id) }),
    ]
}

/// Strategy for generating structurally valid envelopes
fn arbitrary_envelope() -> impl Strategy<Value = EncryptedEnvelope> {
    (
        arbitrary_key_exchange(),
        any::<u128>(),
        any::<[u8; NONCE_SIZE]>(),
        any::<[u8; TAG_SIZE]>(),
        prop::collection::vec(any::<u8>(), 0..128),
        prop::collection::vec(any::<u8>(), 0..1024),
        any::<i64>(),
    )
        .prop_map(|(key_exchange, sender, nonce, auth_tag, aad, encrypted_content, timestamp)| {
            EncryptedEnvelope {
                version: VERSION,
                algorithm: Algorithm::KemAead,
                key_exchange,
                sender_key_id: KeyId::from_u128(sender),
                nonce,
                auth_tag,
                aad,
                encrypted_content,
                timestamp,
            }
        })
}

#[test]
fn prop_decode_never_panics() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..2048))| {
        // PROPERTY: arbitrary input yields Ok or Err, never a panic
        let _ = EncryptedEnvelope::decode(&bytes);
    });
}

#[test]
fn prop_decode_never_panics_on_valid_header_prefix() {
    proptest!(|(envelope in arbitrary_envelope(), noise in prop::collection::vec(any::<u8>(), 0..64), cut in any::<prop::sample::Index>())| {
        let mut bytes = envelope.to_bytes().expect("encode should succeed");
        let at = cut.index(bytes.len());
        bytes.truncate(at);
        bytes.extend_from_slice(&noise);

        // PROPERTY: a valid header followed by garbage never panics
        let _ = EncryptedEnvelope::decode(&bytes);
    });
}

#[test]
fn prop_binary_form_preserves_envelope() {
    proptest!(|(envelope in arbitrary_envelope())| {
        let bytes = envelope.to_bytes().expect("encode should succeed");
        prop_assert_eq!(bytes.len(), envelope.encoded_len());

        let decoded = EncryptedEnvelope::decode(&bytes).expect("decode should succeed");
        prop_assert_eq!(decoded, envelope);
    });
}

#[test]
fn prop_json_form_agrees_with_binary_form() {
    proptest!(|(envelope in arbitrary_envelope())| {
        let json = envelope.to_json().expect("json encode should succeed");
        let from_json = EncryptedEnvelope::from_json(&json).expect("json decode should succeed");

        // PROPERTY: both wire forms carry the same envelope
        let binary = from_json.to_bytes().expect("encode should succeed");
        prop_assert_eq!(binary, envelope.to_bytes().expect("encode should succeed"));
    });
}

#[test]
fn prop_truncation_is_rejected() {
    proptest!(|(envelope in arbitrary_envelope(), drop in 1usize..64)| {
        let bytes = envelope.to_bytes().expect("encode should succeed");
        let keep = bytes.len().saturating_sub(drop);

        // PROPERTY: a short buffer is an error, whichever section it cuts
        prop_assert!(EncryptedEnvelope::decode(&bytes[..keep]).is_err());
    });
}

#[test]
fn prop_trailing_bytes_are_rejected() {
    proptest!(|(envelope in arbitrary_envelope(), extra in prop::collection::vec(any::<u8>(), 1..32))| {
        let mut bytes = envelope.to_bytes().expect("encode should succeed");
        bytes.extend_from_slice(&extra);

        let result = EncryptedEnvelope::decode(&bytes);
        prop_assert!(
            matches!(result, Err(EnvelopeError::LengthMismatch { .. })),
            "trailing bytes must be rejected"
        );
    });
}

#[test]
fn prop_flipped_key_exchange_tag_is_rejected() {
    proptest!(|(envelope in arbitrary_envelope())| {
        let mut bytes = envelope.to_bytes().expect("encode should succeed");
        // swap cold <-> warm; declared total length no longer matches
        bytes[2] ^= 0x03;

        prop_assert!(EncryptedEnvelope::decode(&bytes).is_err());
    });
}
