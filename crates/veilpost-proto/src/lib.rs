//! Wire format for the Veilpost encryption core.
//!
//! An envelope is a fixed 64-byte header (zero-copy binary, Big Endian)
//! followed by the key-exchange section, the associated data and the AEAD
//! ciphertext. The header carries everything a receiver needs to select a key
//! and recompute the associated data, so the variable sections are never
//! interpreted before the header has been validated.
//!
//! The same envelope has a JSON form (camelCase keys, base64 byte fields) for
//! transports that only move text.
//!
//! # Security
//!
//! This crate provides structural validity only. A decoded envelope has a
//! known version, a known algorithm, exactly one key-exchange variant and
//! bounded section sizes. Nothing here authenticates the content: the
//! associated data is recomputed and checked by the core before decryption.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aad;
pub mod envelope;
pub mod errors;
pub mod header;
pub mod ids;
pub mod json;

pub use aad::{AAD_CONTEXT, AAD_SIZE, AadFields};
pub use envelope::{Algorithm, EncryptedEnvelope, KeyExchange};
pub use errors::{EnvelopeError, Result};
pub use header::EnvelopeHeader;
pub use ids::{KeyId, SessionId};

/// Current envelope version. Anything else is rejected outright.
pub const VERSION: u8 = 0x01;

/// AEAD nonce size (96-bit).
pub const NONCE_SIZE: usize = 12;

/// AEAD authentication tag size.
pub const TAG_SIZE: usize = 16;

/// ML-KEM-1024 ciphertext size carried by cold-start envelopes.
pub const KEM_CIPHERTEXT_SIZE: usize = 1568;

/// Upper bound on the transmitted associated data.
pub const MAX_AAD_SIZE: usize = 1024;

/// Upper bound on the encrypted content (16 MB).
pub const MAX_CONTENT_SIZE: usize = 16 * 1024 * 1024;
