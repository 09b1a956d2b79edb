//! Message encryption using ChaCha20-Poly1305
//!
//! All functions are pure - the nonce must be provided by the caller, drawn
//! fresh from a secure RNG for every message.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;

/// AEAD key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Nonce size (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext`, returning ciphertext and detached tag.
///
/// # Security
///
/// - The nonce MUST NOT repeat under the same key
/// - `aad` is authenticated but not encrypted
pub fn encrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> (Vec<u8>, [u8; TAG_SIZE]) {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut buffer = plaintext.to_vec();

    let Ok(tag) = cipher.encrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buffer)
    else {
        unreachable!("ChaCha20-Poly1305 accepts messages up to 256 GiB");
    };

    let mut detached = [0u8; TAG_SIZE];
    detached.copy_from_slice(&tag);
    (buffer, detached)
}

/// Verify and decrypt.
///
/// # Errors
///
/// - `Authentication` if the tag does not verify for this key, nonce, aad
///   and ciphertext. No plaintext is released in that case.
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut buffer = ciphertext.to_vec();

    match cipher.decrypt_in_place_detached(
        Nonce::from_slice(nonce),
        aad,
        &mut buffer,
        Tag::from_slice(tag),
    ) {
        Ok(()) => Ok(Zeroizing::new(buffer)),
        Err(_) => {
            buffer.zeroize();
            Err(CryptoError::Authentication)
        },
    }
}
