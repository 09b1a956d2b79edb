//! Key encapsulation using ML-KEM-1024
//!
//! All functions are pure - randomness arrives as seeds and coins from the
//! caller and drives a ChaCha20 CSPRNG inside the call.

use std::fmt;

use hmac::{Hmac, Mac};
use ml_kem::{
    EncodedSizeUser, KemCore, MlKem1024,
    kem::{Decapsulate, Encapsulate},
};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{entropy::check_entropy, error::CryptoError};

type EK = <MlKem1024 as KemCore>::EncapsulationKey;
type DK = <MlKem1024 as KemCore>::DecapsulationKey;
type HmacSha256 = Hmac<Sha256>;

/// Encapsulation key size (1568 bytes)
pub const PUBLIC_KEY_SIZE: usize = 1568;

/// Decapsulation key size (3168 bytes)
pub const SECRET_KEY_SIZE: usize = 3168;

/// KEM ciphertext size (1568 bytes)
pub const CIPHERTEXT_SIZE: usize = 1568;

/// Shared secret size (32 bytes)
pub const SHARED_SECRET_SIZE: usize = 32;

/// Label for the fallback secret on decapsulation failure
const IMPLICIT_REJECTION_LABEL: &[u8] = b"veilpost/kem/implicit-rejection/v1";

/// ML-KEM-1024 encapsulation key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(Box<[u8; PUBLIC_KEY_SIZE]>);

impl PublicKey {
    /// Parse from bytes of exactly [`PUBLIC_KEY_SIZE`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array = <[u8; PUBLIC_KEY_SIZE]>::try_from(bytes).map_err(|_| CryptoError::InvalidKey {
            kind: "public key",
            expected: PUBLIC_KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(Box::new(array)))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey([{PUBLIC_KEY_SIZE} bytes])")
    }
}

/// ML-KEM-1024 decapsulation key.
///
/// Zeroized on drop. Never leaves the owning process.
pub struct SecretKey(Box<[u8; SECRET_KEY_SIZE]>);

impl SecretKey {
    /// Parse from bytes of exactly [`SECRET_KEY_SIZE`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidKey {
                kind: "secret key",
                expected: SECRET_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = Box::new([0u8; SECRET_KEY_SIZE]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.0
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl ZeroizeOnDrop for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// ML-KEM-1024 ciphertext.
#[derive(Clone, PartialEq, Eq)]
pub struct KemCiphertext(Box<[u8; CIPHERTEXT_SIZE]>);

impl KemCiphertext {
    /// Parse from bytes of exactly [`CIPHERTEXT_SIZE`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array = <[u8; CIPHERTEXT_SIZE]>::try_from(bytes).map_err(|_| CryptoError::InvalidKey {
            kind: "KEM ciphertext",
            expected: CIPHERTEXT_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(Box::new(array)))
    }

    /// Wrap an already-sized buffer.
    pub fn from_boxed(bytes: Box<[u8; CIPHERTEXT_SIZE]>) -> Self {
        Self(bytes)
    }

    /// Unwrap into the sized buffer.
    pub fn into_boxed(self) -> Box<[u8; CIPHERTEXT_SIZE]> {
        self.0
    }

    /// Raw ciphertext bytes.
    pub fn as_bytes(&self) -> &[u8; CIPHERTEXT_SIZE] {
        &self.0
    }
}

impl fmt::Debug for KemCiphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KemCiphertext([{CIPHERTEXT_SIZE} bytes])")
    }
}

/// 32-byte KEM shared secret.
///
/// Consumed once by the key schedule. Zeroized on drop; equality is
/// constant-time.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn from_bytes_for_test(bytes: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self(bytes)
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for SharedSecret {}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Freshly generated keypair.
#[derive(Debug)]
pub struct KemKeyPair {
    /// Publishable encapsulation key
    pub public_key: PublicKey,
    /// Private decapsulation key
    pub secret_key: SecretKey,
}

/// Output of [`encapsulate`].
#[derive(Debug)]
pub struct EncapsulationResult {
    /// Ciphertext to send to the key owner
    pub ciphertext: KemCiphertext,
    /// Secret shared with the key owner
    pub shared_secret: SharedSecret,
}

/// Generate an ML-KEM-1024 keypair from a 32-byte seed.
///
/// # Errors
///
/// - `Entropy` if the seed fails [`check_entropy`]
///
/// # Security
///
/// Caller MUST provide cryptographically secure random bytes in production.
/// The same seed always yields the same keypair.
pub fn generate_keypair(seed: &[u8; 32]) -> Result<KemKeyPair, CryptoError> {
    check_entropy(seed)?;

    let mut rng = ChaCha20Rng::from_seed(*seed);
    let (dk, ek) = MlKem1024::generate(&mut rng);

    let mut public = Box::new([0u8; PUBLIC_KEY_SIZE]);
    public.copy_from_slice(&ek.as_bytes()[..]);

    let mut encoded = dk.as_bytes();
    let mut secret = Box::new([0u8; SECRET_KEY_SIZE]);
    secret.copy_from_slice(&encoded[..]);
    encoded.zeroize();

    Ok(KemKeyPair { public_key: PublicKey(public), secret_key: SecretKey(secret) })
}

/// Encapsulate a fresh shared secret against `public_key`.
///
/// # Errors
///
/// - `InvalidKey` if `public_key` is not [`PUBLIC_KEY_SIZE`] bytes
/// - `Entropy` if `coins` fail [`check_entropy`]
pub fn encapsulate(public_key: &[u8], coins: &[u8; 32]) -> Result<EncapsulationResult, CryptoError> {
    let invalid = || CryptoError::InvalidKey {
        kind: "public key",
        expected: PUBLIC_KEY_SIZE,
        actual: public_key.len(),
    };
    if public_key.len() != PUBLIC_KEY_SIZE {
        return Err(invalid());
    }
    check_entropy(coins)?;

    let encoded: ml_kem::Encoded<EK> = public_key.try_into().map_err(|_| invalid())?;
    let ek = EK::from_bytes(&encoded);

    let mut rng = ChaCha20Rng::from_seed(*coins);
    let Ok((ct, mut ss)) = ek.encapsulate(&mut rng) else {
        unreachable!("ML-KEM encapsulation cannot fail with a well-sized key");
    };

    let mut ciphertext = Box::new([0u8; CIPHERTEXT_SIZE]);
    ciphertext.copy_from_slice(&ct[..]);

    let mut shared = [0u8; SHARED_SECRET_SIZE];
    shared.copy_from_slice(&ss[..]);
    ss.zeroize();

    Ok(EncapsulationResult {
        ciphertext: KemCiphertext(ciphertext),
        shared_secret: SharedSecret(shared),
    })
}

/// Recover the shared secret from `ciphertext`.
///
/// Never fails. A corrupted ciphertext yields a deterministic pseudorandom
/// secret (ML-KEM implicit rejection); the AEAD layer then rejects the
/// message. If the library itself reports an error, the secret is
/// HMAC-SHA256(secret key, label || ciphertext), which has the same shape.
pub fn decapsulate(ciphertext: &KemCiphertext, secret_key: &SecretKey) -> SharedSecret {
    let encoded: Result<ml_kem::Encoded<DK>, _> = secret_key.as_bytes()[..].try_into();
    let Ok(mut encoded) = encoded else {
        return implicit_rejection(ciphertext, secret_key);
    };
    let dk = DK::from_bytes(&encoded);
    encoded.zeroize();

    let ct: Result<ml_kem::Ciphertext<MlKem1024>, _> = ciphertext.as_bytes()[..].try_into();
    let Ok(ct) = ct else {
        return implicit_rejection(ciphertext, secret_key);
    };

    match dk.decapsulate(&ct) {
        Ok(mut ss) => {
            let mut shared = [0u8; SHARED_SECRET_SIZE];
            shared.copy_from_slice(&ss[..]);
            ss.zeroize();
            SharedSecret(shared)
        },
        Err(_) => implicit_rejection(ciphertext, secret_key),
    }
}

fn implicit_rejection(ciphertext: &KemCiphertext, secret_key: &SecretKey) -> SharedSecret {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret_key.as_bytes()) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(IMPLICIT_REJECTION_LABEL);
    mac.update(ciphertext.as_bytes());

    let mut shared = [0u8; SHARED_SECRET_SIZE];
    shared.copy_from_slice(&mac.finalize().into_bytes());
    SharedSecret(shared)
}
