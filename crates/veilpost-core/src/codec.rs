//! Hybrid envelope seal and open.
//!
//! Seal:
//!
//! 1. Draw the nonce. Every fallible step runs before the session cache is
//!    touched, so a failed seal never leaves a session the recipient will
//!    not learn about
//! 2. Reuse the live outbound session for the recipient, or encapsulate
//!    against the recipient key and create one (cold start)
//! 3. Build the associated data from version, algorithm, key-exchange tag,
//!    timestamp, sender key id and session id
//! 4. Encrypt under the session key with a fresh random nonce; the AEAD
//!    associated data is the transmitted aad followed by the secret MAC
//!    context
//!
//! Open mirrors this. Cold envelopes are decapsulated and the session is
//! stored only after the tag verifies; warm envelopes resolve their session
//! or fail with `SessionNotFound`. The transmitted aad is never used as is:
//! it is rebuilt from the envelope fields and compared in constant time.

use veilpost_crypto::{
    KemCiphertext, KeyMaterial, MESSAGE_PURPOSE, PUBLIC_KEY_SIZE, check_entropy, ct_eq,
    decapsulate, decrypt, derive_key_material, derive_session_id, encapsulate, encrypt,
};
use veilpost_proto::{
    AAD_SIZE, AadFields, Algorithm, EncryptedEnvelope, EnvelopeError, KeyExchange, KeyId,
    MAX_CONTENT_SIZE, NONCE_SIZE, SessionId, VERSION,
};
use zeroize::Zeroizing;

use crate::{
    env::Environment,
    error::CoreError,
    identity::{KeyPair, PublicIdentity, SenderContext},
    session::Established,
    session_manager::SessionManager,
};

/// Plaintext and metadata of an opened envelope.
#[derive(Debug)]
pub struct Opened {
    /// Decrypted content, zeroized on drop
    pub plaintext: Zeroizing<Vec<u8>>,
    /// Sender key id bound into the associated data
    pub sender_key_id: KeyId,
    /// Session the envelope belongs to
    pub session_id: SessionId,
    /// Whether a KEM exchange was performed to open it
    pub cold_start: bool,
    /// Older than the staleness window; the caller decides how to warn
    pub stale: bool,
}

fn session_id_for(ciphertext: &KemCiphertext) -> SessionId {
    SessionId::from_digest_prefix(derive_session_id(ciphertext))
}

fn full_aad(aad: &[u8; AAD_SIZE], key_material: &KeyMaterial) -> Zeroizing<Vec<u8>> {
    let mut bound = Zeroizing::new(Vec::with_capacity(AAD_SIZE + 32));
    bound.extend_from_slice(aad);
    bound.extend_from_slice(key_material.mac_context());
    bound
}

/// Run a KEM exchange against `recipient`.
fn establish_outbound<E: Environment>(
    env: &E,
    recipient: &PublicIdentity,
) -> Result<Established, CoreError> {
    let mut coins = Zeroizing::new([0u8; 32]);
    env.random_bytes(coins.as_mut_slice())?;

    let exchange = encapsulate(&recipient.public_key, &coins)?;
    let key_material =
        derive_key_material(&exchange.shared_secret, &recipient.key_id.to_bytes(), MESSAGE_PURPOSE);

    Ok(Established {
        session_id: session_id_for(&exchange.ciphertext),
        peer_key_id: recipient.key_id,
        key_material,
        kem_ciphertext: exchange.ciphertext,
    })
}

/// Encrypt `plaintext` for `recipient`.
pub(crate) fn seal<E: Environment>(
    env: &E,
    sessions: &SessionManager<E>,
    plaintext: &[u8],
    recipient: &PublicIdentity,
    sender: &SenderContext,
) -> Result<EncryptedEnvelope, CoreError> {
    if recipient.public_key.len() != PUBLIC_KEY_SIZE {
        return Err(CoreError::InvalidKey {
            kind: "public key",
            expected: PUBLIC_KEY_SIZE,
            actual: recipient.public_key.len(),
        });
    }
    if plaintext.len() > MAX_CONTENT_SIZE {
        return Err(EnvelopeError::TooLarge {
            field: "encryptedContent",
            size: plaintext.len(),
            max: MAX_CONTENT_SIZE,
        }
        .into());
    }

    let mut nonce = [0u8; NONCE_SIZE];
    env.random_bytes(&mut nonce)?;
    check_entropy(&nonce)?;

    // Nothing below may fail once a session is created or a slot reserved.
    let acquired =
        sessions.get_or_create(recipient.key_id, || establish_outbound(env, recipient))?;
    let session = &acquired.session;

    let key_exchange = match acquired.kem_ciphertext {
        Some(ciphertext) => KeyExchange::Cold { kem_ciphertext: ciphertext.into_boxed() },
        None => KeyExchange::Warm { session_id: session.id() },
    };

    let timestamp = env.wall_clock_millis();
    let aad = AadFields {
        version: VERSION,
        algorithm: Algorithm::KemAead,
        key_exchange_tag: key_exchange.tag(),
        timestamp,
        sender_key_id: sender.sender_key_id,
        session_id: session.id(),
    }
    .to_bytes();

    let key_material = session.key_material();
    let (encrypted_content, auth_tag) =
        encrypt(key_material.aead_key(), &nonce, &full_aad(&aad, key_material), plaintext);

    tracing::trace!(
        session_id = %session.id(),
        cold_start = matches!(key_exchange, KeyExchange::Cold { .. }),
        len = encrypted_content.len(),
        "sealed envelope"
    );

    Ok(EncryptedEnvelope {
        version: VERSION,
        algorithm: Algorithm::KemAead,
        key_exchange,
        sender_key_id: sender.sender_key_id,
        nonce,
        auth_tag,
        aad: aad.to_vec(),
        encrypted_content,
        timestamp,
    })
}

/// Where the session key for an envelope came from.
enum Resolved<I> {
    Cold { established: Established },
    Warm { session: std::sync::Arc<crate::session::Session<I>> },
}

impl<I> Resolved<I>
where
    I: Copy + Ord + std::ops::Add<std::time::Duration, Output = I>,
{
    fn key_material(&self) -> &KeyMaterial {
        match self {
            Self::Cold { established } => &established.key_material,
            Self::Warm { session } => session.key_material(),
        }
    }
}

/// Verify and decrypt `envelope` with `recipient`'s secret key.
pub(crate) fn open<E: Environment>(
    env: &E,
    sessions: &SessionManager<E>,
    staleness_window: std::time::Duration,
    envelope: &EncryptedEnvelope,
    recipient: &KeyPair,
) -> Result<Opened, CoreError> {
    if envelope.version != VERSION {
        return Err(EnvelopeError::UnsupportedVersion(envelope.version).into());
    }

    let (session_id, resolved) = match &envelope.key_exchange {
        KeyExchange::Cold { kem_ciphertext } => {
            let ciphertext = KemCiphertext::from_boxed(kem_ciphertext.clone());
            let shared_secret = decapsulate(&ciphertext, recipient.secret_key());
            let key_material = derive_key_material(
                &shared_secret,
                &recipient.key_id().to_bytes(),
                MESSAGE_PURPOSE,
            );
            let session_id = session_id_for(&ciphertext);
            let established = Established {
                session_id,
                peer_key_id: envelope.sender_key_id,
                key_material,
                kem_ciphertext: ciphertext,
            };
            (session_id, Resolved::Cold { established })
        },
        KeyExchange::Warm { session_id } => {
            let session = sessions.lookup(*session_id)?;
            if session.peer_key_id() != envelope.sender_key_id {
                tracing::warn!(session_id = %session_id, "warm envelope names a different sender");
                return Err(CoreError::Authentication);
            }
            (*session_id, Resolved::Warm { session })
        },
    };

    let expected_aad = AadFields {
        version: envelope.version,
        algorithm: envelope.algorithm,
        key_exchange_tag: envelope.key_exchange.tag(),
        timestamp: envelope.timestamp,
        sender_key_id: envelope.sender_key_id,
        session_id,
    }
    .to_bytes();

    if !ct_eq(&envelope.aad, &expected_aad) {
        tracing::warn!(session_id = %session_id, "associated data mismatch, discarding envelope");
        return Err(CoreError::Authentication);
    }

    let key_material = resolved.key_material();
    let plaintext = decrypt(
        key_material.aead_key(),
        &envelope.nonce,
        &full_aad(&expected_aad, key_material),
        &envelope.encrypted_content,
        &envelope.auth_tag,
    )
    .inspect_err(|_| {
        tracing::warn!(session_id = %session_id, "envelope failed authentication");
    })?;

    let cold_start = match resolved {
        Resolved::Cold { established } => {
            sessions.establish_inbound(established);
            true
        },
        Resolved::Warm { session } => {
            session.record_use();
            false
        },
    };

    Ok(Opened {
        plaintext,
        sender_key_id: envelope.sender_key_id,
        session_id,
        cold_start,
        stale: is_stale(env.wall_clock_millis(), envelope.timestamp, staleness_window),
    })
}

/// Older than `window` by wall clock. Future-dated envelopes are not stale.
fn is_stale(now_millis: i64, timestamp: i64, window: std::time::Duration) -> bool {
    let window = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    now_millis.saturating_sub(timestamp) > window
}
