//! Envelope header with zero-copy parsing.
//!
//! The `EnvelopeHeader` is a fixed 64-byte structure serialized as raw binary
//! (Big Endian). A receiver learns everything it needs to pick a key and
//! recompute the associated data from this one cache line, before touching
//! the variable-length sections.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Algorithm, KeyId, MAX_AAD_SIZE, MAX_CONTENT_SIZE, NONCE_SIZE, TAG_SIZE, VERSION,
    errors::{EnvelopeError, Result},
};

/// Key-exchange tag for envelopes carrying a KEM ciphertext.
pub const KEY_EXCHANGE_COLD: u8 = 0x01;

/// Key-exchange tag for envelopes referencing a live session.
pub const KEY_EXCHANGE_WARM: u8 = 0x02;

/// Fixed 64-byte envelope header (Big Endian network byte order)
///
/// Fields are raw byte arrays so every 64-byte pattern is a valid value and
/// the struct can be cast directly from untrusted bytes.
///
/// ```text
/// 0      version
/// 1      algorithm
/// 2      key exchange (0x01 cold, 0x02 warm)
/// 3      reserved (zero)
/// 4..12  timestamp (i64 epoch millis)
/// 12..28 sender key id
/// 28..40 nonce
/// 40..56 authentication tag
/// 56..60 aad length (u32)
/// 60..64 content length (u32)
/// ```
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct EnvelopeHeader {
    version: u8,
    algorithm: u8,
    key_exchange: u8,
    reserved: u8,
    timestamp: [u8; 8],
    sender_key_id: [u8; 16],
    nonce: [u8; NONCE_SIZE],
    auth_tag: [u8; TAG_SIZE],
    aad_len: [u8; 4],
    content_len: [u8; 4],
}

/// Values needed to build a header.
#[derive(Debug, Clone, Copy)]
pub struct HeaderFields {
    /// Algorithm suite
    pub algorithm: Algorithm,
    /// Key-exchange tag ([`KEY_EXCHANGE_COLD`] or [`KEY_EXCHANGE_WARM`])
    pub key_exchange: u8,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Sender key identifier
    pub sender_key_id: KeyId,
    /// AEAD nonce
    pub nonce: [u8; NONCE_SIZE],
    /// AEAD tag
    pub auth_tag: [u8; TAG_SIZE],
    /// Length of the transmitted associated data
    pub aad_len: u32,
    /// Length of the encrypted content
    pub content_len: u32,
}

impl EnvelopeHeader {
    /// Size of the serialized header (64 bytes)
    pub const SIZE: usize = 64;

    /// Build a header for the current version.
    pub fn new(fields: &HeaderFields) -> Self {
        Self {
            version: VERSION,
            algorithm: fields.algorithm.to_u8(),
            key_exchange: fields.key_exchange,
            reserved: 0,
            timestamp: fields.timestamp.to_be_bytes(),
            sender_key_id: fields.sender_key_id.to_bytes(),
            nonce: fields.nonce,
            auth_tag: fields.auth_tag,
            aad_len: fields.aad_len.to_be_bytes(),
            content_len: fields.content_len.to_be_bytes(),
        }
    }

    /// Parse a header from the front of `bytes` (zero-copy, safe).
    ///
    /// Returns the header and the bytes that follow it.
    ///
    /// # Errors
    ///
    /// - `TooShort` if fewer than 64 bytes are available
    /// - `UnsupportedVersion` for any version other than [`VERSION`]
    /// - `UnknownAlgorithm` / `UnknownKeyExchange` for unassigned identifiers
    /// - `ReservedNonZero` if the reserved byte is set
    /// - `TooLarge` if a declared section exceeds its limit
    ///
    /// # Security
    ///
    /// Checks run cheapest-first. Declared lengths are bounded here, before
    /// any caller slices or allocates based on them.
    pub fn parse(bytes: &[u8]) -> Result<(&Self, &[u8])> {
        let (header, rest) = Self::ref_from_prefix(bytes).map_err(|_| EnvelopeError::TooShort {
            expected: Self::SIZE,
            actual: bytes.len(),
        })?;

        if header.version != VERSION {
            return Err(EnvelopeError::UnsupportedVersion(header.version));
        }

        if Algorithm::from_u8(header.algorithm).is_none() {
            return Err(EnvelopeError::UnknownAlgorithm(format!("{:#04x}", header.algorithm)));
        }

        if !matches!(header.key_exchange, KEY_EXCHANGE_COLD | KEY_EXCHANGE_WARM) {
            return Err(EnvelopeError::UnknownKeyExchange(header.key_exchange));
        }

        if header.reserved != 0 {
            return Err(EnvelopeError::ReservedNonZero(header.reserved));
        }

        let aad_len = header.aad_len() as usize;
        if aad_len > MAX_AAD_SIZE {
            return Err(EnvelopeError::TooLarge { field: "aad", size: aad_len, max: MAX_AAD_SIZE });
        }

        let content_len = header.content_len() as usize;
        if content_len > MAX_CONTENT_SIZE {
            return Err(EnvelopeError::TooLarge {
                field: "encryptedContent",
                size: content_len,
                max: MAX_CONTENT_SIZE,
            });
        }

        Ok((header, rest))
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Envelope version byte.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Algorithm suite. Parsing guarantees this is known.
    pub fn algorithm(&self) -> Option<Algorithm> {
        Algorithm::from_u8(self.algorithm)
    }

    /// Raw key-exchange tag.
    pub fn key_exchange(&self) -> u8 {
        self.key_exchange
    }

    /// Epoch milliseconds at sealing time.
    pub fn timestamp(&self) -> i64 {
        i64::from_be_bytes(self.timestamp)
    }

    /// Sender key identifier.
    pub fn sender_key_id(&self) -> KeyId {
        KeyId::from_bytes(self.sender_key_id)
    }

    /// AEAD nonce.
    pub fn nonce(&self) -> [u8; NONCE_SIZE] {
        self.nonce
    }

    /// AEAD authentication tag.
    pub fn auth_tag(&self) -> [u8; TAG_SIZE] {
        self.auth_tag
    }

    /// Declared associated-data length.
    pub fn aad_len(&self) -> u32 {
        u32::from_be_bytes(self.aad_len)
    }

    /// Declared content length.
    pub fn content_len(&self) -> u32 {
        u32::from_be_bytes(self.content_len)
    }
}

impl std::fmt::Debug for EnvelopeHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeHeader")
            .field("version", &self.version())
            .field("algorithm", &self.algorithm())
            .field("key_exchange", &self.key_exchange())
            .field("timestamp", &self.timestamp())
            .field("sender_key_id", &self.sender_key_id())
            .field("aad_len", &self.aad_len())
            .field("content_len", &self.content_len())
            .finish_non_exhaustive()
    }
}
