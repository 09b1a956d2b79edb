//! JSON form of the envelope (camelCase keys, base64 byte fields).

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::{
    Algorithm, EncryptedEnvelope, KEM_CIPHERTEXT_SIZE, KeyExchange, KeyId, MAX_AAD_SIZE,
    MAX_CONTENT_SIZE, NONCE_SIZE, SessionId, TAG_SIZE, VERSION,
    errors::{EnvelopeError, Result},
};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JsonEnvelope {
    version: u8,
    algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kem_ciphertext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<SessionId>,
    sender_key_id: KeyId,
    nonce: String,
    auth_tag: String,
    aad: String,
    encrypted_content: String,
    timestamp: i64,
}

fn decode_field(field: &'static str, text: &str) -> Result<Vec<u8>> {
    STANDARD.decode(text).map_err(|_| EnvelopeError::InvalidBase64 { field })
}

fn fixed<const N: usize>(field: &'static str, bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| EnvelopeError::InvalidFieldLength {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

fn bounded(field: &'static str, bytes: Vec<u8>, max: usize) -> Result<Vec<u8>> {
    if bytes.len() > max {
        return Err(EnvelopeError::TooLarge { field, size: bytes.len(), max });
    }
    Ok(bytes)
}

impl EncryptedEnvelope {
    /// Render as JSON.
    pub fn to_json(&self) -> Result<String> {
        if self.version != VERSION {
            return Err(EnvelopeError::UnsupportedVersion(self.version));
        }

        let (kem_ciphertext, session_id) = match &self.key_exchange {
            KeyExchange::Cold { kem_ciphertext } => {
                (Some(STANDARD.encode(kem_ciphertext.as_slice())), None)
            },
            KeyExchange::Warm { session_id } => (None, Some(*session_id)),
        };

        let json = JsonEnvelope {
            version: self.version,
            algorithm: self.algorithm.as_str().to_owned(),
            kem_ciphertext,
            session_id,
            sender_key_id: self.sender_key_id,
            nonce: STANDARD.encode(self.nonce),
            auth_tag: STANDARD.encode(self.auth_tag),
            aad: STANDARD.encode(&self.aad),
            encrypted_content: STANDARD.encode(&self.encrypted_content),
            timestamp: self.timestamp,
        };

        serde_json::to_string(&json).map_err(|e| EnvelopeError::Json(e.to_string()))
    }

    /// Parse the JSON form.
    ///
    /// The version and algorithm are validated before any byte field is
    /// decoded, and the key-exchange variant is fixed before the envelope is
    /// built.
    pub fn from_json(text: &str) -> Result<Self> {
        let json: JsonEnvelope =
            serde_json::from_str(text).map_err(|e| EnvelopeError::Json(e.to_string()))?;

        if json.version != VERSION {
            return Err(EnvelopeError::UnsupportedVersion(json.version));
        }
        let algorithm = Algorithm::from_name(&json.algorithm)
            .ok_or_else(|| EnvelopeError::UnknownAlgorithm(json.algorithm.clone()))?;

        let key_exchange = match (json.kem_ciphertext, json.session_id) {
            (Some(ct), None) => {
                let bytes = decode_field("kemCiphertext", &ct)?;
                let kem_ciphertext = Box::new(fixed::<KEM_CIPHERTEXT_SIZE>("kemCiphertext", &bytes)?);
                KeyExchange::Cold { kem_ciphertext }
            },
            (None, Some(session_id)) => KeyExchange::Warm { session_id },
            _ => return Err(EnvelopeError::AmbiguousKeyExchange),
        };

        let nonce = fixed::<NONCE_SIZE>("nonce", &decode_field("nonce", &json.nonce)?)?;
        let auth_tag = fixed::<TAG_SIZE>("authTag", &decode_field("authTag", &json.auth_tag)?)?;
        let aad = bounded("aad", decode_field("aad", &json.aad)?, MAX_AAD_SIZE)?;
        let encrypted_content = bounded(
            "encryptedContent",
            decode_field("encryptedContent", &json.encrypted_content)?,
            MAX_CONTENT_SIZE,
        )?;

        Ok(Self {
            version: json.version,
            algorithm,
            key_exchange,
            sender_key_id: json.sender_key_id,
            nonce,
            auth_tag,
            aad,
            encrypted_content,
            timestamp: json.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> EncryptedEnvelope {
        EncryptedEnvelope {
            version: VERSION,
            algorithm: Algorithm::KemAead,
            key_exchange: KeyExchange::Warm {
                session_id: "8f0e3c2a-1b4d-8e6f-9a0b-1c2d3e4f5a6b".parse().unwrap(),
            },
            sender_key_id: "3b241101-e2bb-4255-8caf-4136c566a962".parse().unwrap(),
            nonce: [0; NONCE_SIZE],
            auth_tag: [0xFF; TAG_SIZE],
            aad: vec![1, 2, 3],
            encrypted_content: b"hello".to_vec(),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn uses_camel_case_and_base64() {
        let text = envelope().to_json().unwrap();

        assert!(text.contains("\"sessionId\":\"8f0e3c2a-1b4d-8e6f-9a0b-1c2d3e4f5a6b\""));
        assert!(text.contains("\"authTag\":\"/////////////////////w==\""));
        assert!(text.contains("\"encryptedContent\":\"aGVsbG8=\""));
        assert!(text.contains("\"algorithm\":\"KEM_AEAD\""));
        assert!(!text.contains("kemCiphertext"));

        assert_eq!(EncryptedEnvelope::from_json(&text).unwrap(), envelope());
    }

    #[test]
    fn cold_envelope_serializes_ciphertext() {
        let mut cold = envelope();
        cold.key_exchange = KeyExchange::Cold { kem_ciphertext: Box::new([9; KEM_CIPHERTEXT_SIZE]) };

        let text = cold.to_json().unwrap();
        assert!(text.contains("kemCiphertext"));
        assert!(!text.contains("sessionId"));
        assert_eq!(EncryptedEnvelope::from_json(&text).unwrap(), cold);
    }

    #[test]
    fn rejects_both_key_exchange_fields() {
        let mut value: serde_json::Value = serde_json::from_str(&envelope().to_json().unwrap()).unwrap();
        value["kemCiphertext"] = serde_json::Value::String(STANDARD.encode([0u8; KEM_CIPHERTEXT_SIZE]));

        let result = EncryptedEnvelope::from_json(&value.to_string());
        assert_eq!(result.err(), Some(EnvelopeError::AmbiguousKeyExchange));
    }

    #[test]
    fn rejects_missing_key_exchange() {
        let mut value: serde_json::Value = serde_json::from_str(&envelope().to_json().unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("sessionId");

        let result = EncryptedEnvelope::from_json(&value.to_string());
        assert_eq!(result.err(), Some(EnvelopeError::AmbiguousKeyExchange));
    }

    #[test]
    fn rejects_unknown_algorithm_and_version() {
        let mut value: serde_json::Value = serde_json::from_str(&envelope().to_json().unwrap()).unwrap();
        value["algorithm"] = serde_json::Value::String("XOR".into());
        assert!(matches!(
            EncryptedEnvelope::from_json(&value.to_string()),
            Err(EnvelopeError::UnknownAlgorithm(name)) if name == "XOR"
        ));

        let mut value: serde_json::Value = serde_json::from_str(&envelope().to_json().unwrap()).unwrap();
        value["version"] = serde_json::Value::from(2);
        assert_eq!(
            EncryptedEnvelope::from_json(&value.to_string()).err(),
            Some(EnvelopeError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let mut value: serde_json::Value = serde_json::from_str(&envelope().to_json().unwrap()).unwrap();
        value["plaintext"] = serde_json::Value::String("leak".into());
        assert!(matches!(
            EncryptedEnvelope::from_json(&value.to_string()),
            Err(EnvelopeError::Json(_))
        ));
    }

    #[test]
    fn rejects_wrong_nonce_length() {
        let mut value: serde_json::Value = serde_json::from_str(&envelope().to_json().unwrap()).unwrap();
        value["nonce"] = serde_json::Value::String(STANDARD.encode([0u8; 8]));
        assert_eq!(
            EncryptedEnvelope::from_json(&value.to_string()).err(),
            Some(EnvelopeError::InvalidFieldLength { field: "nonce", expected: 12, actual: 8 })
        );
    }

    #[test]
    fn rejects_bad_base64() {
        let mut value: serde_json::Value = serde_json::from_str(&envelope().to_json().unwrap()).unwrap();
        value["encryptedContent"] = serde_json::Value::String("not base64!".into());
        assert_eq!(
            EncryptedEnvelope::from_json(&value.to_string()).err(),
            Some(EnvelopeError::InvalidBase64 { field: "encryptedContent" })
        );
    }
}
