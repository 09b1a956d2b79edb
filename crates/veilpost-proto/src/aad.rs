//! Deterministic associated data.
//!
//! Both parties build these bytes from envelope metadata with a fixed field
//! order and fixed-width integers. The receiver never trusts the transmitted
//! copy: it rebuilds the bytes and compares.

use crate::{Algorithm, KeyId, SessionId};

/// Domain-separation prefix for associated data.
pub const AAD_CONTEXT: &[u8; 15] = b"veilpost/aad/v1";

/// Serialized size: prefix + version + algorithm + key-exchange tag +
/// timestamp + sender key id + session id.
pub const AAD_SIZE: usize = AAD_CONTEXT.len() + 1 + 1 + 1 + 8 + 16 + 16;

/// Metadata bound into the AEAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AadFields {
    /// Envelope version
    pub version: u8,
    /// Algorithm suite
    pub algorithm: Algorithm,
    /// Key-exchange tag (cold or warm)
    pub key_exchange_tag: u8,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Sender key identifier
    pub sender_key_id: KeyId,
    /// Session the envelope belongs to (derived on cold start)
    pub session_id: SessionId,
}

impl AadFields {
    /// Serialize in the canonical order.
    pub fn to_bytes(&self) -> [u8; AAD_SIZE] {
        let mut out = [0u8; AAD_SIZE];
        let mut pos = 0;

        let mut put = |bytes: &[u8]| {
            out[pos..pos + bytes.len()].copy_from_slice(bytes);
            pos += bytes.len();
        };

        put(AAD_CONTEXT);
        put(&[self.version, self.algorithm.to_u8(), self.key_exchange_tag]);
        put(&self.timestamp.to_be_bytes());
        put(&self.sender_key_id.to_bytes());
        put(&self.session_id.to_bytes());

        out
    }
}
