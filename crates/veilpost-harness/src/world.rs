//! A set of parties sharing one clock and one relay.

use veilpost_core::{CoreConfig, CoreError, Direction, EncryptedEnvelope, KeyExchange, SessionId};
use veilpost_crypto::{KemCiphertext, derive_session_id};

use crate::{
    SimEnv,
    invariants::TrafficSnapshot,
    party::{Inbox, Party, SendError, Sent},
    sim_relay::SimRelay,
};

/// Chat id used for every send in a world.
pub const WORLD_CHAT_ID: u128 = 0x5EA1;

/// Parties, relay and the plaintexts they exchanged.
pub struct SimWorld {
    env: SimEnv,
    relay: SimRelay,
    config: CoreConfig,
    parties: Vec<Party>,
    sent: Vec<Vec<u8>>,
}

impl SimWorld {
    /// Empty world with a seeded environment.
    pub fn new(seed: u64, config: CoreConfig) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            relay: SimRelay::new(),
            config,
            parties: Vec::new(),
            sent: Vec::new(),
        }
    }

    /// World with `count` parties, account ids 1..=count.
    pub fn with_parties(seed: u64, config: CoreConfig, count: usize) -> Result<Self, CoreError> {
        let mut world = Self::new(seed, config);
        for _ in 0..count {
            world.add_party()?;
        }
        Ok(world)
    }

    /// Add a party and return its index.
    pub fn add_party(&mut self) -> Result<usize, CoreError> {
        let index = self.parties.len();
        let account_id = index as u64 + 1;
        self.parties.push(Party::new(account_id, self.env.clone(), self.config.clone())?);
        Ok(index)
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Shared relay.
    pub fn relay(&self) -> &SimRelay {
        &self.relay
    }

    /// Party by index.
    pub fn party(&self, index: usize) -> &Party {
        &self.parties[index]
    }

    /// Number of parties.
    pub fn len(&self) -> usize {
        self.parties.len()
    }

    /// Whether the world has no parties.
    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    /// Send from one party to another through the relay.
    pub fn send(&mut self, from: usize, to: usize, plaintext: &[u8]) -> Result<Sent, SendError> {
        let sent = self.parties[from].send(&self.relay, &self.parties[to], WORLD_CHAT_ID, plaintext)?;
        self.sent.push(plaintext.to_vec());
        Ok(sent)
    }

    /// Deliver everything waiting for `to`.
    pub fn deliver(&self, to: usize) -> Inbox {
        self.parties[to].receive(&self.relay)
    }

    /// Relay contents plus every endpoint secret, for invariant checks.
    pub fn snapshot(&self) -> TrafficSnapshot {
        let stored = self.relay.stored();
        let session_ids: Vec<SessionId> = stored
            .iter()
            .filter_map(|bytes| EncryptedEnvelope::decode(bytes.as_bytes()).ok())
            .map(|envelope| session_of(&envelope))
            .collect();

        let mut snapshot = TrafficSnapshot::from_stored(stored);
        for plaintext in &self.sent {
            snapshot = snapshot.with_plaintext(plaintext.clone());
        }

        for party in &self.parties {
            let account = party.account_id();
            snapshot = snapshot.with_secret(
                format!("secret key of {account}"),
                party.keypair().secret_key().as_bytes().to_vec(),
            );

            for session_id in &session_ids {
                for direction in [Direction::Inbound, Direction::Outbound] {
                    if let Some(session) = party.core().sessions().peek(*session_id, direction) {
                        let keys = session.key_material();
                        snapshot = snapshot
                            .with_secret(format!("aead key {session_id}"), keys.aead_key().to_vec())
                            .with_secret(
                                format!("mac context {session_id}"),
                                keys.mac_context().to_vec(),
                            );
                    }
                }
            }
        }

        snapshot
    }
}

/// Session an envelope belongs to, computed the way receivers do.
pub fn session_of(envelope: &EncryptedEnvelope) -> SessionId {
    match &envelope.key_exchange {
        KeyExchange::Warm { session_id } => *session_id,
        KeyExchange::Cold { kem_ciphertext } => SessionId::from_digest_prefix(derive_session_id(
            &KemCiphertext::from_boxed(kem_ciphertext.clone()),
        )),
    }
}
