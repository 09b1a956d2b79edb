//! Veilpost Cryptographic Primitives
//!
//! Cryptographic building blocks for Veilpost. Pure functions with
//! deterministic outputs. Callers provide random bytes (keypair seeds,
//! encapsulation coins, nonces) for deterministic testing.
//!
//! # Key Lifecycle
//!
//! A recipient publishes an ML-KEM-1024 public key. A sender encapsulates
//! against it to obtain a 32-byte shared secret and a ciphertext only the
//! recipient can open. Both sides run the same key schedule over the shared
//! secret, producing an AEAD key and a MAC context that is folded into the
//! associated data.
//!
//! ```text
//! Recipient Public Key
//!        │
//!        ▼
//! ML-KEM-1024 Encapsulate → Ciphertext (sent) + Shared Secret
//!        │
//!        ▼
//! HKDF-SHA512 (context || key id || purpose) → AEAD Key + MAC Context
//!        │
//!        ▼
//! ChaCha20-Poly1305 → Ciphertext + Tag
//! ```
//!
//! The shared secret is consumed once by the key schedule and zeroized. The
//! derived key material lives as long as the session that owns it.
//!
//! # Security
//!
//! Post-Quantum Confidentiality:
//! - ML-KEM-1024 (FIPS 203, NIST Level 5) through an audited implementation
//! - Sizes are compile-time constants; no parameter negotiation exists
//!
//! Implicit Rejection:
//! - Decapsulation never fails. A malformed ciphertext yields a
//!   pseudorandom secret, so decryption later fails authentication instead
//!   of exposing a validity oracle
//!
//! Authenticity:
//! - ChaCha20-Poly1305 verifies the tag before releasing plaintext
//! - Failed authentication tag -> reject message, zeroize working buffer
//!
//! Hygiene:
//! - Secret keys, shared secrets and derived keys zeroize on drop
//! - `Debug` output never includes secret bytes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod entropy;
pub mod error;
pub mod kdf;
pub mod kem;

pub use aead::{KEY_SIZE, NONCE_SIZE, TAG_SIZE, decrypt, encrypt};
pub use entropy::check_entropy;
pub use error::CryptoError;
pub use kdf::{
    KDF_CONTEXT, KEY_MATERIAL_SIZE, KeyMaterial, MESSAGE_PURPOSE, derive_key_material,
    derive_session_id,
};
pub use kem::{
    CIPHERTEXT_SIZE, EncapsulationResult, KemCiphertext, KemKeyPair, PUBLIC_KEY_SIZE, PublicKey,
    SECRET_KEY_SIZE, SHARED_SECRET_SIZE, SecretKey, SharedSecret, decapsulate, encapsulate,
    generate_keypair,
};

/// Constant-time equality for byte strings.
///
/// Length is not secret: inputs of different length compare unequal
/// immediately.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
