//! Envelope parsing and serialization errors.

use thiserror::Error;

/// Result alias for envelope operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// Malformed or unsupported envelope.
///
/// Every variant describes structure only. Messages never include key
/// material or decrypted content, so they are safe to log at the transport
/// boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Buffer ends before a required section
    #[error("envelope too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Version byte is not [`crate::VERSION`]
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// Algorithm identifier is not known
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Key-exchange tag is neither cold nor warm
    #[error("unknown key exchange tag: {0:#04x}")]
    UnknownKeyExchange(u8),

    /// Reserved header byte carries a value
    #[error("reserved header byte must be zero, got {0:#04x}")]
    ReservedNonZero(u8),

    /// Section exceeds its protocol limit
    #[error("{field} too large: {size} bytes exceeds maximum {max}")]
    TooLarge {
        /// Section name
        field: &'static str,
        /// Declared or actual size
        size: usize,
        /// Maximum permitted size
        max: usize,
    },

    /// Header-declared length disagrees with the buffer
    #[error("length mismatch: header declares {declared} bytes, buffer has {actual}")]
    LengthMismatch {
        /// Total length implied by the header
        declared: usize,
        /// Buffer length
        actual: usize,
    },

    /// Fixed-size field has the wrong length
    #[error("invalid {field} length: expected {expected} bytes, got {actual}")]
    InvalidFieldLength {
        /// Field name
        field: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Identifier is not a hyphenated UUID
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Field is not valid base64
    #[error("invalid base64 in {field}")]
    InvalidBase64 {
        /// Field name
        field: &'static str,
    },

    /// JSON envelope could not be parsed or produced
    #[error("malformed JSON envelope: {0}")]
    Json(String),

    /// Both or neither of the key-exchange fields are present
    #[error("envelope must carry exactly one of kemCiphertext or sessionId")]
    AmbiguousKeyExchange,
}
