//! Observable traffic snapshots for invariant checking.
//!
//! A snapshot pairs what the relay holds (ciphertext bytes) with what only
//! the endpoints know (plaintexts, secret keys, session keys). Invariants
//! compare the two; the relay itself never sees the second half.

use veilpost_core::OpaqueEnvelope;

/// Everything an invariant may inspect.
#[derive(Debug, Clone, Default)]
pub struct TrafficSnapshot {
    /// Envelopes as stored by the relay.
    pub stored: Vec<OpaqueEnvelope>,
    /// Plaintexts handed to `seal`.
    pub plaintexts: Vec<Vec<u8>>,
    /// Secret bytes that must never appear on the wire.
    pub secrets: Vec<SecretSample>,
}

/// A secret value known to an endpoint.
#[derive(Clone)]
pub struct SecretSample {
    /// What the bytes are, for violation reports.
    pub label: String,
    /// The secret bytes.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for SecretSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretSample({}, [{} bytes])", self.label, self.bytes.len())
    }
}

impl TrafficSnapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot of relay contents with no endpoint knowledge attached.
    pub fn from_stored(stored: Vec<OpaqueEnvelope>) -> Self {
        Self { stored, ..Self::default() }
    }

    /// Attach a plaintext that was sealed.
    pub fn with_plaintext(mut self, plaintext: impl Into<Vec<u8>>) -> Self {
        self.plaintexts.push(plaintext.into());
        self
    }

    /// Attach a secret value.
    pub fn with_secret(mut self, label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.secrets.push(SecretSample { label: label.into(), bytes: bytes.into() });
        self
    }
}

/// Whether `needle` occurs anywhere in `haystack`.
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
