//! A simulated endpoint: one identity, one core, one relay account.

use thiserror::Error;
use veilpost_core::{
    Ack, Core, CoreConfig, CoreError, EncryptedEnvelope, KeyPair, OpaqueEnvelope, Opened,
    PublicIdentity, RoutingMetadata, SenderContext, SessionId, Transport, TransportError,
    accept_delivery,
};
use veilpost_proto::EnvelopeError;

use crate::{SimEnv, sim_relay::SimRelay};

/// Failures while sending through the relay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Sealing failed
    #[error(transparent)]
    Core(#[from] CoreError),
    /// Encoding the sealed envelope failed
    #[error(transparent)]
    Encode(#[from] EnvelopeError),
    /// Relay refused the envelope
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What a send produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    /// Relay acknowledgement
    pub ack: Ack,
    /// Whether the envelope carried a KEM ciphertext
    pub cold_start: bool,
    /// Session the envelope belongs to, when warm
    pub session_id: Option<SessionId>,
}

/// Outcome of draining a mailbox.
#[derive(Debug, Default)]
pub struct Inbox {
    /// Envelopes that opened, in delivery order
    pub opened: Vec<Opened>,
    /// Envelopes that decoded but failed to open
    pub rejected: Vec<(u64, CoreError)>,
    /// Envelopes discarded as malformed
    pub discarded: usize,
}

impl Inbox {
    /// Plaintexts of opened envelopes.
    pub fn plaintexts(&self) -> Vec<Vec<u8>> {
        self.opened.iter().map(|opened| opened.plaintext.to_vec()).collect()
    }
}

/// Simulated endpoint.
pub struct Party {
    account_id: u64,
    core: Core<SimEnv>,
    keypair: KeyPair,
}

impl Party {
    /// Create a party with a fresh keypair.
    pub fn new(account_id: u64, env: SimEnv, config: CoreConfig) -> Result<Self, CoreError> {
        let core = Core::new(env, config);
        let keypair = core.generate_keypair()?;
        Ok(Self { account_id, core, keypair })
    }

    /// Relay account id.
    pub fn account_id(&self) -> u64 {
        self.account_id
    }

    /// Published identity.
    pub fn identity(&self) -> PublicIdentity {
        self.keypair.public_identity()
    }

    /// Own keypair.
    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    /// Own core.
    pub fn core(&self) -> &Core<SimEnv> {
        &self.core
    }

    /// Seal without sending.
    pub fn seal_for(
        &self,
        recipient: &PublicIdentity,
        plaintext: &[u8],
    ) -> Result<EncryptedEnvelope, CoreError> {
        self.core.seal(plaintext, recipient, &SenderContext::for_keypair(&self.keypair))
    }

    /// Open without fetching.
    pub fn open(&self, envelope: &EncryptedEnvelope) -> Result<Opened, CoreError> {
        self.core.open(envelope, &self.keypair)
    }

    /// Seal `plaintext` for `recipient` and hand it to the relay.
    pub fn send(
        &self,
        relay: &SimRelay,
        recipient: &Party,
        chat_id: u128,
        plaintext: &[u8],
    ) -> Result<Sent, SendError> {
        let envelope = self.seal_for(&recipient.identity(), plaintext)?;
        let cold_start = envelope.is_cold_start();
        let session_id = envelope.session_id();

        let routing = RoutingMetadata {
            sender_id: self.account_id,
            recipient_id: recipient.account_id,
            chat_id,
        };
        let ack = relay.store_and_route(OpaqueEnvelope::encode(&envelope)?, routing)?;

        Ok(Sent { ack, cold_start, session_id })
    }

    /// Fetch and open everything waiting at the relay.
    pub fn receive(&self, relay: &SimRelay) -> Inbox {
        let mut inbox = Inbox::default();

        for delivery in relay.fetch(self.account_id) {
            let Some(envelope) = accept_delivery(&delivery.envelope) else {
                inbox.discarded += 1;
                continue;
            };
            match self.open(&envelope) {
                Ok(opened) => inbox.opened.push(opened),
                Err(err) => inbox.rejected.push((delivery.sequence, err)),
            }
        }

        inbox
    }

    /// Drop the outbound session towards `recipient` so the next send is a
    /// cold start. The usual reaction to the peer reporting
    /// `SessionNotFound`.
    pub fn reset_session(&self, recipient: &Party) {
        if let Some(session_id) = self.core.sessions().outbound_session(recipient.keypair.key_id()) {
            self.core.revoke_session(session_id);
        }
    }
}
