//! Long-term identities.

use veilpost_crypto::{PUBLIC_KEY_SIZE, PublicKey, SecretKey};
use veilpost_proto::KeyId;

/// A KEM keypair owned by one identity.
///
/// The secret key never leaves the owning process and is zeroized when the
/// keypair is dropped.
#[derive(Debug)]
pub struct KeyPair {
    key_id: KeyId,
    public_key: PublicKey,
    secret_key: SecretKey,
    created_at_millis: i64,
}

impl KeyPair {
    /// Assemble from stored parts.
    pub fn from_parts(
        key_id: KeyId,
        public_key: PublicKey,
        secret_key: SecretKey,
        created_at_millis: i64,
    ) -> Self {
        Self { key_id, public_key, secret_key, created_at_millis }
    }

    /// Key identifier.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Encapsulation key (1568 bytes).
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Decapsulation key (3168 bytes).
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Creation time in epoch milliseconds.
    pub fn created_at_millis(&self) -> i64 {
        self.created_at_millis
    }

    /// The publishable half.
    pub fn public_identity(&self) -> PublicIdentity {
        PublicIdentity { key_id: self.key_id, public_key: self.public_key.as_bytes().to_vec() }
    }
}

/// What a sender knows about a recipient.
///
/// The key is raw bytes as received from a directory; its length is
/// checked when sealing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIdentity {
    /// Recipient key identifier
    pub key_id: KeyId,
    /// Recipient encapsulation key
    pub public_key: Vec<u8>,
}

impl PublicIdentity {
    /// Whether the key has the ML-KEM-1024 size.
    pub fn is_well_formed(&self) -> bool {
        self.public_key.len() == PUBLIC_KEY_SIZE
    }
}

/// Sender-side metadata bound into every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderContext {
    /// Key identifier of the sending identity
    pub sender_key_id: KeyId,
}

impl SenderContext {
    /// Context for the owner of `keypair`.
    pub fn for_keypair(keypair: &KeyPair) -> Self {
        Self { sender_key_id: keypair.key_id() }
    }
}
