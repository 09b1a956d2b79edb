//! Zero-knowledge transport contract.
//!
//! The transport/storage layer is an external collaborator. It receives an
//! [`OpaqueEnvelope`] plus [`RoutingMetadata`], stores it and forwards it
//! unmodified. The types here give it nothing else to work with: an opaque
//! envelope exposes its encoded length and bytes, never a field, and the
//! trait offers no way to hand key material across.
//!
//! Implementations must not offer any endpoint capable of decrypting or
//! inspecting `encryptedContent`, `kemCiphertext` or session keys.

use bytes::Bytes;
use thiserror::Error;
use veilpost_proto::{EncryptedEnvelope, EnvelopeError};

/// Encoded envelope as seen by the transport.
#[derive(Clone, PartialEq, Eq)]
pub struct OpaqueEnvelope(Bytes);

impl OpaqueEnvelope {
    /// Encode an envelope for hand-off.
    pub fn encode(envelope: &EncryptedEnvelope) -> Result<Self, EnvelopeError> {
        envelope.to_bytes().map(|bytes| Self(Bytes::from(bytes)))
    }

    /// Wrap bytes received from the transport.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Encoded bytes, for storage and forwarding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for OpaqueEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpaqueEnvelope([{} bytes])", self.0.len())
    }
}

/// Who sent what to whom, in transport terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingMetadata {
    /// Sending account
    pub sender_id: u64,
    /// Receiving account
    pub recipient_id: u64,
    /// Conversation
    pub chat_id: u128,
}

/// Transport acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Transport-assigned position of the stored envelope
    pub sequence: u64,
}

/// Transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Transport refused the envelope (quota, unknown recipient)
    #[error("envelope rejected: {reason}")]
    Rejected {
        /// Reason given by the transport
        reason: String,
    },

    /// Transport temporarily unreachable
    #[error("transport unavailable: {reason}")]
    Unavailable {
        /// Reason given by the transport
        reason: String,
    },
}

/// Store-and-forward collaborator.
///
/// Synchronous by design of the contract: the core hands over bytes and
/// receives an acknowledgement. Implementations typically share internal
/// state via Arc.
pub trait Transport: Send + Sync {
    /// Persist `envelope` and route it to the recipient.
    ///
    /// # Invariants
    ///
    /// - Post: the stored bytes are exactly `envelope.as_bytes()`
    fn store_and_route(
        &self,
        envelope: OpaqueEnvelope,
        routing: RoutingMetadata,
    ) -> Result<Ack, TransportError>;
}

/// Decode an envelope delivered by the transport.
///
/// Malformed envelopes are logged by length and error kind only, then
/// discarded: the caller gets `None` and never sees the bytes again.
pub fn accept_delivery(envelope: &OpaqueEnvelope) -> Option<EncryptedEnvelope> {
    match EncryptedEnvelope::decode(envelope.as_bytes()) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::warn!(len = envelope.len(), error = %err, "discarding malformed envelope");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_reveals_only_length() {
        let envelope = OpaqueEnvelope::from_bytes(vec![0x41u8; 10]);
        assert_eq!(format!("{envelope:?}"), "OpaqueEnvelope([10 bytes])");
    }

    #[test]
    fn malformed_delivery_is_discarded() {
        assert!(accept_delivery(&OpaqueEnvelope::from_bytes(vec![1u8, 2, 3])).is_none());
        assert!(accept_delivery(&OpaqueEnvelope::from_bytes(Vec::<u8>::new())).is_none());
    }
}
