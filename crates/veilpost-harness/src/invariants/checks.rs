//! Standard invariant checks.
//!
//! Each one states a property of the bytes the relay holds. They hold for
//! every scenario, whatever the order of sends, expiries and revocations.

use std::collections::HashMap;

use veilpost_proto::{AadFields, EncryptedEnvelope};

use super::{Invariant, InvariantResult, TrafficSnapshot, Violation, snapshot::contains};
use crate::world::session_of;

/// Shorter plaintexts may legitimately occur in random ciphertext.
pub const MIN_PROBE_LEN: usize = 16;

fn decoded(state: &TrafficSnapshot) -> impl Iterator<Item = (usize, EncryptedEnvelope)> + '_ {
    state
        .stored
        .iter()
        .enumerate()
        .filter_map(|(index, bytes)| EncryptedEnvelope::decode(bytes.as_bytes()).ok().map(|e| (index, e)))
}

/// Every stored envelope decodes.
///
/// Senders only hand well-formed envelopes to the relay, and the relay
/// stores bytes unmodified.
pub struct EnvelopesWellFormed;

impl Invariant for EnvelopesWellFormed {
    fn name(&self) -> &'static str {
        "EnvelopesWellFormed"
    }

    fn check(&self, state: &TrafficSnapshot) -> InvariantResult {
        for (index, envelope) in state.stored.iter().enumerate() {
            if let Err(err) = EncryptedEnvelope::decode(envelope.as_bytes()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("stored envelope {index} ({} bytes): {err}", envelope.len()),
                });
            }
        }
        Ok(())
    }
}

/// No sealed plaintext appears in relay storage.
pub struct PlaintextNeverStored;

impl Invariant for PlaintextNeverStored {
    fn name(&self) -> &'static str {
        "PlaintextNeverStored"
    }

    fn check(&self, state: &TrafficSnapshot) -> InvariantResult {
        for (p, plaintext) in state.plaintexts.iter().enumerate() {
            if plaintext.len() < MIN_PROBE_LEN {
                continue;
            }
            for (index, envelope) in state.stored.iter().enumerate() {
                if contains(envelope.as_bytes(), plaintext) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("plaintext {p} found in stored envelope {index}"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// No secret key or session key appears in relay storage.
pub struct SecretsNeverStored;

impl Invariant for SecretsNeverStored {
    fn name(&self) -> &'static str {
        "SecretsNeverStored"
    }

    fn check(&self, state: &TrafficSnapshot) -> InvariantResult {
        for secret in &state.secrets {
            for (index, envelope) in state.stored.iter().enumerate() {
                if contains(envelope.as_bytes(), &secret.bytes) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("{} found in stored envelope {index}", secret.label),
                    });
                }
            }
        }
        Ok(())
    }
}

/// No two stored envelopes share a nonce.
pub struct NonceUniqueness;

impl Invariant for NonceUniqueness {
    fn name(&self) -> &'static str {
        "NonceUniqueness"
    }

    fn check(&self, state: &TrafficSnapshot) -> InvariantResult {
        let mut seen = HashMap::new();
        for (index, envelope) in decoded(state) {
            if let Some(first) = seen.insert(envelope.nonce, index) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("envelopes {first} and {index} share a nonce"),
                });
            }
        }
        Ok(())
    }
}

/// The transmitted associated data is exactly what the header fields imply.
pub struct AadBindsHeader;

impl Invariant for AadBindsHeader {
    fn name(&self) -> &'static str {
        "AadBindsHeader"
    }

    fn check(&self, state: &TrafficSnapshot) -> InvariantResult {
        for (index, envelope) in decoded(state) {
            let expected = AadFields {
                version: envelope.version,
                algorithm: envelope.algorithm,
                key_exchange_tag: envelope.key_exchange.tag(),
                timestamp: envelope.timestamp,
                sender_key_id: envelope.sender_key_id,
                session_id: session_of(&envelope),
            }
            .to_bytes();

            if envelope.aad != expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("envelope {index}: aad does not match header fields"),
                });
            }
        }
        Ok(())
    }
}
