//! Error taxonomy for the encryption core.
//!
//! Five kinds, each with a fixed handling policy: entropy failures abort,
//! invalid keys reject the call, authentication failures discard the
//! message, missing sessions trigger a cold-start retry, and malformed
//! envelopes are dropped at the transport boundary.
//!
//! Cryptographic failures are never retried with the same inputs. Messages
//! carry identifiers and sizes only, never plaintext, keys or secrets.

use thiserror::Error;
use veilpost_crypto::CryptoError;
use veilpost_proto::{EnvelopeError, SessionId};

use crate::env::EntropyError;

/// Errors surfaced by `seal`, `open`, `generate_keypair` and
/// `revoke_session`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Secure randomness unavailable or failed the sanity check
    #[error("entropy failure: {reason}")]
    Entropy {
        /// What failed
        reason: String,
    },

    /// Recipient key or ciphertext has the wrong size
    #[error("invalid {kind}: expected {expected} bytes, got {actual}")]
    InvalidKey {
        /// What was being parsed
        kind: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Tag or associated data did not verify
    #[error("envelope failed authentication")]
    Authentication,

    /// Warm-path envelope references a session this side no longer holds
    #[error("session not found: {session_id}")]
    SessionNotFound {
        /// Referenced session
        session_id: SessionId,
    },

    /// Envelope is structurally invalid
    #[error("serialization error: {0}")]
    Serialization(#[from] EnvelopeError),
}

impl CoreError {
    /// Whether the process cannot make progress on any input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Entropy { .. })
    }

    /// Whether an automatic fallback exists.
    ///
    /// Only a missing session qualifies: the sender revokes its session and
    /// reseals with a fresh KEM exchange.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }

    /// Text safe to show an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Entropy { .. } => "secure randomness is unavailable on this device",
            Self::InvalidKey { .. } => "cannot encrypt for this recipient",
            Self::Authentication => "message could not be verified",
            Self::SessionNotFound { .. } => "secure session expired, resending",
            Self::Serialization(_) => "message is malformed",
        }
    }
}

impl From<CryptoError> for CoreError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Entropy { reason } => Self::Entropy { reason: reason.to_owned() },
            CryptoError::InvalidKey { kind, expected, actual } => {
                Self::InvalidKey { kind, expected, actual }
            },
            CryptoError::Authentication => Self::Authentication,
        }
    }
}

impl From<EntropyError> for CoreError {
    fn from(err: EntropyError) -> Self {
        Self::Entropy { reason: err.reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_session_absence_is_recoverable() {
        let missing = CoreError::SessionNotFound { session_id: SessionId::from_u128(1) };
        assert!(missing.is_recoverable());
        assert!(!missing.is_fatal());

        assert!(!CoreError::Authentication.is_recoverable());
        assert!(!CoreError::Serialization(EnvelopeError::UnsupportedVersion(9)).is_recoverable());
    }

    #[test]
    fn entropy_is_fatal() {
        let err = CoreError::from(EntropyError { reason: "getrandom failed".into() });
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "entropy failure: getrandom failed");
    }

    #[test]
    fn crypto_errors_map_to_taxonomy() {
        assert_eq!(CoreError::from(CryptoError::Authentication), CoreError::Authentication);
        assert_eq!(
            CoreError::from(CryptoError::InvalidKey { kind: "public key", expected: 1568, actual: 3 }),
            CoreError::InvalidKey { kind: "public key", expected: 1568, actual: 3 }
        );
    }

    #[test]
    fn user_messages_follow_policy() {
        assert_eq!(CoreError::Authentication.user_message(), "message could not be verified");
        assert_eq!(
            CoreError::InvalidKey { kind: "public key", expected: 1568, actual: 0 }.user_message(),
            "cannot encrypt for this recipient"
        );
    }
}
