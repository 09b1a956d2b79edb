//! Key schedule using HKDF-SHA512

use hkdf::Hkdf;
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::kem::{KemCiphertext, SharedSecret};

/// Domain-separation label prefixed to every HKDF info string
pub const KDF_CONTEXT: &[u8] = b"veilpost/kdf/v1";

/// Purpose label for message-content keys
pub const MESSAGE_PURPOSE: &[u8] = b"veilpost/purpose/message";

/// Label for session identifier derivation
const SESSION_ID_LABEL: &[u8] = b"veilpost/session-id/v1";

/// Total derived key material (AEAD key + MAC context)
pub const KEY_MATERIAL_SIZE: usize = 64;

/// Key material derived from a shared secret.
///
/// The first half keys the AEAD. The second half is a secret byte string
/// appended to the associated data, so the tag also commits to the key
/// schedule output. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    aead_key: [u8; 32],
    mac_context: [u8; 32],
}

impl KeyMaterial {
    /// 32-byte ChaCha20-Poly1305 key.
    pub fn aead_key(&self) -> &[u8; 32] {
        &self.aead_key
    }

    /// 32-byte secret folded into the associated data.
    pub fn mac_context(&self) -> &[u8; 32] {
        &self.mac_context
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Derive AEAD key material from a KEM shared secret.
///
/// `info = KDF_CONTEXT || key_id || purpose`, where `key_id` is the
/// recipient key identifier in wire form.
///
/// # Security
///
/// - Different recipients produce different keys from the same secret
/// - Different purposes produce independent keys
/// - Deterministic: same inputs always produce same output
pub fn derive_key_material(
    shared_secret: &SharedSecret,
    key_id: &[u8; 16],
    purpose: &[u8],
) -> KeyMaterial {
    let hkdf = Hkdf::<Sha512>::new(None, shared_secret.as_bytes());

    let mut info = Vec::with_capacity(KDF_CONTEXT.len() + key_id.len() + purpose.len());
    info.extend_from_slice(KDF_CONTEXT);
    info.extend_from_slice(key_id);
    info.extend_from_slice(purpose);

    let mut okm = [0u8; KEY_MATERIAL_SIZE];
    let Ok(()) = hkdf.expand(&info, &mut okm) else {
        unreachable!("64 bytes is a valid HKDF-SHA512 output length");
    };

    let mut material = KeyMaterial { aead_key: [0u8; 32], mac_context: [0u8; 32] };
    material.aead_key.copy_from_slice(&okm[..32]);
    material.mac_context.copy_from_slice(&okm[32..]);
    okm.zeroize();

    material
}

/// Derive the 16-byte session identifier for a KEM ciphertext.
///
/// `SHA-256(label || ciphertext)[..16]`. The ciphertext is public, so both
/// parties compute the same value without transmitting it.
pub fn derive_session_id(ciphertext: &KemCiphertext) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(SESSION_ID_LABEL);
    hasher.update(ciphertext.as_bytes());
    let digest = hasher.finalize();

    let mut id = [0u8; 16];
    id.copy_from_slice(&digest[..16]);
    id
}
