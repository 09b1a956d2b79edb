//! The four entry points the rest of the application calls.

use veilpost_crypto::generate_keypair as generate_kem_keypair;
use veilpost_proto::{EncryptedEnvelope, KeyId, SessionId};
use zeroize::Zeroizing;

use crate::{
    codec::{self, Opened},
    config::CoreConfig,
    env::Environment,
    error::CoreError,
    identity::{KeyPair, PublicIdentity, SenderContext},
    session_manager::SessionManager,
};

/// Hybrid post-quantum encryption core.
///
/// Cloning shares the session cache. `seal` and `open` are CPU-bound and
/// touch the cache only to resolve or store a session; abandoning a call
/// midway leaves the cache consistent.
#[derive(Clone)]
pub struct Core<E: Environment> {
    env: E,
    config: CoreConfig,
    sessions: SessionManager<E>,
}

impl<E: Environment> Core<E> {
    /// Create a core with an empty session cache.
    pub fn new(env: E, config: CoreConfig) -> Self {
        let sessions = SessionManager::new(env.clone(), config.session.clone());
        Self { env, config, sessions }
    }

    /// Generate a fresh ML-KEM-1024 keypair with a random key id.
    ///
    /// # Errors
    ///
    /// - `Entropy` if the random source fails or returns degenerate bytes
    pub fn generate_keypair(&self) -> Result<KeyPair, CoreError> {
        let mut seed = Zeroizing::new([0u8; 32]);
        self.env.random_bytes(seed.as_mut_slice())?;
        let pair = generate_kem_keypair(&seed)?;

        let mut id_bytes = [0u8; 16];
        self.env.random_bytes(&mut id_bytes)?;
        let key_id = KeyId::from_random_bytes(id_bytes);

        tracing::debug!(key_id = %key_id, "generated keypair");

        Ok(KeyPair::from_parts(
            key_id,
            pair.public_key,
            pair.secret_key,
            self.env.wall_clock_millis(),
        ))
    }

    /// Encrypt `plaintext` for `recipient`.
    ///
    /// Reuses the live session for the recipient (warm path, envelope
    /// carries the session id) or performs a KEM exchange (cold start,
    /// envelope carries the KEM ciphertext).
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if the recipient key is not 1568 bytes
    /// - `Entropy` if the random source fails
    /// - `Serialization` if the plaintext exceeds the content limit
    pub fn seal(
        &self,
        plaintext: &[u8],
        recipient: &PublicIdentity,
        sender: &SenderContext,
    ) -> Result<EncryptedEnvelope, CoreError> {
        codec::seal(&self.env, &self.sessions, plaintext, recipient, sender)
    }

    /// Verify and decrypt an envelope addressed to `recipient`.
    ///
    /// # Errors
    ///
    /// - `Authentication` if the envelope was tampered with or not meant for
    ///   this key; nothing is decrypted
    /// - `SessionNotFound` if a warm envelope references a session this side
    ///   no longer holds; the sender should revoke and reseal
    /// - `Serialization` for an unsupported version
    pub fn open(
        &self,
        envelope: &EncryptedEnvelope,
        recipient: &KeyPair,
    ) -> Result<Opened, CoreError> {
        codec::open(&self.env, &self.sessions, self.config.staleness_window, envelope, recipient)
    }

    /// Destroy a session. Idempotent.
    pub fn revoke_session(&self, session_id: SessionId) {
        self.sessions.revoke(session_id);
    }

    /// Session cache, for the sweeper and diagnostics.
    pub fn sessions(&self) -> &SessionManager<E> {
        &self.sessions
    }

    /// Active configuration.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}
