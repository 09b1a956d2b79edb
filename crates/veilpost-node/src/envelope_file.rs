//! Envelope files for the CLI.
//!
//! Envelopes are written either as the JSON form or as raw wire bytes.
//! Reading detects the form: JSON always starts with `{` (after optional
//! whitespace) while the wire form starts with the version byte.

use serde::Serialize;
use veilpost_proto::{EncryptedEnvelope, EnvelopeError, KeyExchange, KeyId, SessionId};

/// On-disk envelope form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EnvelopeFormat {
    /// Base64 fields in a JSON object
    #[default]
    Json,
    /// Wire bytes
    Binary,
}

/// Serialize `envelope` in `format`.
pub fn encode_envelope(
    envelope: &EncryptedEnvelope,
    format: EnvelopeFormat,
) -> Result<Vec<u8>, EnvelopeError> {
    match format {
        EnvelopeFormat::Json => envelope.to_json().map(String::into_bytes),
        EnvelopeFormat::Binary => envelope.to_bytes(),
    }
}

/// Detect the form of `bytes`.
pub fn detect_format(bytes: &[u8]) -> EnvelopeFormat {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => EnvelopeFormat::Json,
        _ => EnvelopeFormat::Binary,
    }
}

/// Parse an envelope in either form.
pub fn decode_envelope(bytes: &[u8]) -> Result<EncryptedEnvelope, EnvelopeError> {
    match detect_format(bytes) {
        EnvelopeFormat::Json => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| EnvelopeError::Json("not UTF-8".to_owned()))?;
            EncryptedEnvelope::from_json(text)
        },
        EnvelopeFormat::Binary => EncryptedEnvelope::decode(bytes),
    }
}

/// Unauthenticated envelope metadata, shown by `veilpost inspect`.
///
/// Nothing here has been verified: only a successful open proves the
/// sender and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeSummary {
    /// Envelope version
    pub version: u8,
    /// Algorithm suite name
    pub algorithm: &'static str,
    /// `cold` or `warm`
    pub key_exchange: &'static str,
    /// Session reference (warm envelopes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Claimed sender
    pub sender_key_id: KeyId,
    /// Claimed sealing time in epoch milliseconds
    pub timestamp: i64,
    /// Ciphertext length; the tag is detached so this is the plaintext length
    pub content_len: usize,
    /// Serialized size
    pub encoded_len: usize,
}

impl EnvelopeSummary {
    /// Summarize without decrypting.
    pub fn of(envelope: &EncryptedEnvelope) -> Self {
        let (key_exchange, session_id) = match &envelope.key_exchange {
            KeyExchange::Cold { .. } => ("cold", None),
            KeyExchange::Warm { session_id } => ("warm", Some(*session_id)),
        };
        Self {
            version: envelope.version,
            algorithm: envelope.algorithm.as_str(),
            key_exchange,
            session_id,
            sender_key_id: envelope.sender_key_id,
            timestamp: envelope.timestamp,
            content_len: envelope.encrypted_content.len(),
            encoded_len: envelope.encoded_len(),
        }
    }
}
