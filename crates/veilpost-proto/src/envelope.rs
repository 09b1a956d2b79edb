//! Encrypted envelope: the unit handed to the transport layer.
//!
//! Layout on the wire:
//!
//! ```text
//! [EnvelopeHeader: 64 bytes]
//! [key exchange: kemCiphertext (1568 bytes) | sessionId (16 bytes)]
//! [aad: aadLen bytes]
//! [encryptedContent: contentLen bytes]
//! ```
//!
//! The key-exchange section is a tagged variant. Cold-start envelopes carry
//! the KEM ciphertext; warm-path envelopes carry the session identifier.
//! Decoding picks the variant from the header tag and rejects any buffer
//! whose length disagrees with the header.

use std::fmt;

use bytes::BufMut;

use crate::{
    KEM_CIPHERTEXT_SIZE, KeyId, NONCE_SIZE, SessionId, TAG_SIZE, VERSION,
    errors::{EnvelopeError, Result},
    header::{EnvelopeHeader, HeaderFields, KEY_EXCHANGE_COLD, KEY_EXCHANGE_WARM},
};

/// Algorithm suite carried in the envelope.
///
/// One suite exists today: ML-KEM-1024 key encapsulation feeding a
/// ChaCha20-Poly1305 AEAD through HKDF-SHA512.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Algorithm {
    /// KEM key exchange + AEAD payload encryption
    KemAead = 0x01,
}

impl Algorithm {
    /// Wire byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire byte. `None` if unassigned.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::KemAead),
            _ => None,
        }
    }

    /// Text name used by the JSON form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KemAead => "KEM_AEAD",
        }
    }

    /// Parse the JSON text name. `None` if unknown.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "KEM_AEAD" => Some(Self::KemAead),
            _ => None,
        }
    }
}

/// How the sender obtained the shared secret.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyExchange {
    /// Fresh KEM encapsulation against the recipient's public key
    Cold {
        /// ML-KEM ciphertext
        kem_ciphertext: Box<[u8; KEM_CIPHERTEXT_SIZE]>,
    },
    /// Reuse of a session the recipient already holds
    Warm {
        /// Session identifier
        session_id: SessionId,
    },
}

impl KeyExchange {
    /// Header tag for this variant.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Cold { .. } => KEY_EXCHANGE_COLD,
            Self::Warm { .. } => KEY_EXCHANGE_WARM,
        }
    }

    /// Serialized size of the key-exchange section.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Cold { .. } => KEM_CIPHERTEXT_SIZE,
            Self::Warm { .. } => 16,
        }
    }

    fn section_len(tag: u8) -> usize {
        if tag == KEY_EXCHANGE_COLD { KEM_CIPHERTEXT_SIZE } else { 16 }
    }
}

impl fmt::Debug for KeyExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cold { kem_ciphertext } => {
                write!(f, "Cold {{ kem_ciphertext: [{} bytes] }}", kem_ciphertext.len())
            },
            Self::Warm { session_id } => write!(f, "Warm {{ session_id: {session_id} }}"),
        }
    }
}

/// Encrypted envelope (version 1).
///
/// # Invariants
///
/// - `auth_tag` authenticates `encrypted_content` together with `aad` and the
///   secret MAC context under the key derived for this envelope. Changing
///   `encrypted_content`, `nonce`, `auth_tag`, `aad`, `timestamp` or
///   `sender_key_id` makes authentication fail.
/// - `aad` is informational on the receiving side: it is recomputed from the
///   other fields and must match byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// Envelope version (always [`VERSION`])
    pub version: u8,
    /// Algorithm suite
    pub algorithm: Algorithm,
    /// Cold-start ciphertext or warm-path session reference
    pub key_exchange: KeyExchange,
    /// Key identifier of the sender
    pub sender_key_id: KeyId,
    /// Fresh random AEAD nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Detached AEAD tag
    pub auth_tag: [u8; TAG_SIZE],
    /// Transmitted associated data
    pub aad: Vec<u8>,
    /// AEAD ciphertext
    pub encrypted_content: Vec<u8>,
    /// Epoch milliseconds at sealing time (informational)
    pub timestamp: i64,
}

impl EncryptedEnvelope {
    /// KEM ciphertext for cold-start envelopes.
    pub fn kem_ciphertext(&self) -> Option<&[u8; KEM_CIPHERTEXT_SIZE]> {
        match &self.key_exchange {
            KeyExchange::Cold { kem_ciphertext } => Some(kem_ciphertext),
            KeyExchange::Warm { .. } => None,
        }
    }

    /// Session reference for warm-path envelopes.
    pub fn session_id(&self) -> Option<SessionId> {
        match &self.key_exchange {
            KeyExchange::Cold { .. } => None,
            KeyExchange::Warm { session_id } => Some(*session_id),
        }
    }

    /// Whether this envelope carries a KEM ciphertext.
    pub fn is_cold_start(&self) -> bool {
        matches!(self.key_exchange, KeyExchange::Cold { .. })
    }

    /// Total serialized size.
    pub fn encoded_len(&self) -> usize {
        EnvelopeHeader::SIZE
            + self.key_exchange.encoded_len()
            + self.aad.len()
            + self.encrypted_content.len()
    }

    /// Encode into `dst`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedVersion` if `version` is not [`VERSION`]
    /// - `TooLarge` if `aad` or `encrypted_content` exceed their limits
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.version != VERSION {
            return Err(EnvelopeError::UnsupportedVersion(self.version));
        }
        let aad_len = section_len("aad", self.aad.len(), crate::MAX_AAD_SIZE)?;
        let content_len = section_len(
            "encryptedContent",
            self.encrypted_content.len(),
            crate::MAX_CONTENT_SIZE,
        )?;

        let header = EnvelopeHeader::new(&HeaderFields {
            algorithm: self.algorithm,
            key_exchange: self.key_exchange.tag(),
            timestamp: self.timestamp,
            sender_key_id: self.sender_key_id,
            nonce: self.nonce,
            auth_tag: self.auth_tag,
            aad_len,
            content_len,
        });

        dst.put_slice(&header.to_bytes());
        match &self.key_exchange {
            KeyExchange::Cold { kem_ciphertext } => dst.put_slice(kem_ciphertext.as_slice()),
            KeyExchange::Warm { session_id } => dst.put_slice(&session_id.to_bytes()),
        }
        dst.put_slice(&self.aad);
        dst.put_slice(&self.encrypted_content);

        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode from wire bytes.
    ///
    /// # Errors
    ///
    /// Any [`EnvelopeError`] raised by [`EnvelopeHeader::parse`], plus
    /// `LengthMismatch` when the buffer is truncated or has trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (header, rest) = EnvelopeHeader::parse(bytes)?;

        let kx_len = KeyExchange::section_len(header.key_exchange());
        let aad_len = header.aad_len() as usize;
        let content_len = header.content_len() as usize;

        let declared = EnvelopeHeader::SIZE + kx_len + aad_len + content_len;
        if bytes.len() != declared {
            return Err(EnvelopeError::LengthMismatch { declared, actual: bytes.len() });
        }

        let (kx_bytes, rest) = rest.split_at(kx_len);
        let (aad, content) = rest.split_at(aad_len);

        let key_exchange = if header.key_exchange() == KEY_EXCHANGE_COLD {
            let mut kem_ciphertext = Box::new([0u8; KEM_CIPHERTEXT_SIZE]);
            kem_ciphertext.copy_from_slice(kx_bytes);
            KeyExchange::Cold { kem_ciphertext }
        } else {
            let mut id = [0u8; 16];
            id.copy_from_slice(kx_bytes);
            KeyExchange::Warm { session_id: SessionId::from_bytes(id) }
        };

        let algorithm = header
            .algorithm()
            .ok_or_else(|| EnvelopeError::UnknownAlgorithm(String::from("unassigned")))?;

        Ok(Self {
            version: header.version(),
            algorithm,
            key_exchange,
            sender_key_id: header.sender_key_id(),
            nonce: header.nonce(),
            auth_tag: header.auth_tag(),
            aad: aad.to_vec(),
            encrypted_content: content.to_vec(),
            timestamp: header.timestamp(),
        })
    }
}

fn section_len(field: &'static str, len: usize, max: usize) -> Result<u32> {
    if len > max {
        return Err(EnvelopeError::TooLarge { field, size: len, max });
    }
    // max is far below u32::MAX
    Ok(len as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warm_envelope() -> EncryptedEnvelope {
        EncryptedEnvelope {
            version: VERSION,
            algorithm: Algorithm::KemAead,
            key_exchange: KeyExchange::Warm { session_id: SessionId::from_u128(7) },
            sender_key_id: KeyId::from_u128(9),
            nonce: [0x01; NONCE_SIZE],
            auth_tag: [0x02; TAG_SIZE],
            aad: b"associated".to_vec(),
            encrypted_content: b"ciphertext".to_vec(),
            timestamp: 1_700_000_000_000,
        }
    }

    fn cold_envelope() -> EncryptedEnvelope {
        EncryptedEnvelope {
            key_exchange: KeyExchange::Cold {
                kem_ciphertext: Box::new([0xC7; KEM_CIPHERTEXT_SIZE]),
            },
            ..warm_envelope()
        }
    }

    #[test]
    fn warm_envelope_decodes_to_same_value() {
        let envelope = warm_envelope();
        let bytes = envelope.to_bytes().unwrap();

        assert_eq!(bytes.len(), 64 + 16 + 10 + 10);
        assert_eq!(EncryptedEnvelope::decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn cold_envelope_carries_kem_ciphertext() {
        let envelope = cold_envelope();
        let bytes = envelope.to_bytes().unwrap();

        assert_eq!(bytes.len(), 64 + KEM_CIPHERTEXT_SIZE + 20);
        let decoded = EncryptedEnvelope::decode(&bytes).unwrap();
        assert!(decoded.is_cold_start());
        assert_eq!(decoded.session_id(), None);
        assert_eq!(decoded.kem_ciphertext().map(|ct| ct[0]), Some(0xC7));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let bytes = cold_envelope().to_bytes().unwrap();
        let result = EncryptedEnvelope::decode(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(EnvelopeError::LengthMismatch { .. })));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = warm_envelope().to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            EncryptedEnvelope::decode(&bytes),
            Err(EnvelopeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn encode_rejects_foreign_version() {
        let mut envelope = warm_envelope();
        envelope.version = 3;
        assert_eq!(envelope.to_bytes().err(), Some(EnvelopeError::UnsupportedVersion(3)));
    }

    #[test]
    fn encode_rejects_oversized_aad() {
        let mut envelope = warm_envelope();
        envelope.aad = vec![0; crate::MAX_AAD_SIZE + 1];
        assert!(matches!(envelope.to_bytes(), Err(EnvelopeError::TooLarge { field: "aad", .. })));
    }

    #[test]
    fn cold_debug_hides_ciphertext_bytes() {
        let rendered = format!("{:?}", cold_envelope().key_exchange);
        assert_eq!(rendered, "Cold { kem_ciphertext: [1568 bytes] }");
    }

    #[test]
    fn algorithm_names_round_trip() {
        assert_eq!(Algorithm::from_name(Algorithm::KemAead.as_str()), Some(Algorithm::KemAead));
        assert_eq!(Algorithm::from_name("RSA"), None);
        assert_eq!(Algorithm::from_u8(0), None);
    }
}
