//! Error types for cryptographic operations

use thiserror::Error;

/// Errors from the KEM and AEAD engines.
///
/// Messages never carry key bytes, shared secrets or plaintext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Caller-supplied randomness failed the sanity check
    #[error("insufficient entropy: {reason}")]
    Entropy {
        /// Which check failed
        reason: &'static str,
    },

    /// Key or ciphertext has the wrong length for ML-KEM-1024
    #[error("invalid {kind} length: expected {expected} bytes, got {actual}")]
    InvalidKey {
        /// What was being parsed
        kind: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// AEAD tag did not verify
    #[error("authentication failed")]
    Authentication,
}

impl CryptoError {
    /// Whether the operation can never succeed without new randomness.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Entropy { .. })
    }
}
