#![allow(clippy::disallowed_types, reason = "Lock is never held across an await point")]

//! Owner of the session cache.
//!
//! The cache is the only shared mutable state in the core. Every mutation
//! (`get_or_create`, `establish_inbound`, `revoke`, sweep, shutdown) goes
//! through one mutex. Reads hand out `Arc<Session>` snapshots whose state is
//! derived from atomics, so callers never hold the lock while encrypting.
//!
//! Sessions are keyed by id and direction. Outbound sessions are also
//! indexed by peer key id so a sender finds its live session for a
//! recipient. Only inbound sessions resolve warm-path envelopes: a peer can
//! never address a session this side created for sending.
//!
//! A poisoned lock is recovered rather than propagated: every critical
//! section leaves the maps consistent before it can fail.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError},
};

use veilpost_crypto::KemCiphertext;
use veilpost_proto::{KeyId, SessionId};

use crate::{
    config::SessionConfig,
    env::Environment,
    error::CoreError,
    session::{Direction, Established, Session},
};

/// Result of [`SessionManager::get_or_create`].
#[derive(Debug)]
pub struct Acquired<I> {
    /// Session to seal under (one message slot already reserved)
    pub session: Arc<Session<I>>,
    /// Present when the session was created by this call (cold start)
    pub kem_ciphertext: Option<KemCiphertext>,
}

impl<I> Acquired<I> {
    /// Whether this call performed a KEM exchange.
    pub fn is_cold_start(&self) -> bool {
        self.kem_ciphertext.is_some()
    }
}

/// Outcome of a sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Expired sessions were removed
    Swept {
        /// Number of sessions removed
        removed: usize,
    },
    /// Lock was busy; retried next cycle
    Contended,
}

type Key = (SessionId, Direction);

struct Inner<I> {
    sessions: HashMap<Key, Arc<Session<I>>>,
    outbound: HashMap<KeyId, SessionId>,
    shut_down: bool,
}

impl<I> Inner<I>
where
    I: Copy + Ord + std::ops::Add<std::time::Duration, Output = I>,
{
    fn remove(&mut self, key: Key) -> Option<Arc<Session<I>>> {
        let session = self.sessions.remove(&key)?;
        let (session_id, direction) = key;
        if direction == Direction::Outbound
            && self.outbound.get(&session.peer_key_id()) == Some(&session_id)
        {
            self.outbound.remove(&session.peer_key_id());
        }
        session.revoke();
        Some(session)
    }

    fn remove_all(&mut self, keys: impl IntoIterator<Item = Key>) -> usize {
        keys.into_iter().filter_map(|key| self.remove(key)).count()
    }

    fn remove_expired(&mut self, now: I) -> usize {
        let expired: Vec<Key> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_expired(now))
            .map(|(key, _)| *key)
            .collect();

        self.remove_all(expired)
    }
}

/// Thread-safe session cache.
///
/// Cloning shares the cache.
#[derive(Clone)]
pub struct SessionManager<E: Environment> {
    env: E,
    config: SessionConfig,
    inner: Arc<Mutex<Inner<E::Instant>>>,
}

impl<E: Environment> SessionManager<E> {
    /// Create an empty cache.
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self {
            env,
            config,
            inner: Arc::new(Mutex::new(Inner {
                sessions: HashMap::new(),
                outbound: HashMap::new(),
                shut_down: false,
            })),
        }
    }

    /// Session policy in effect.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner<E::Instant>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build(&self, established: Established, direction: Direction) -> Arc<Session<E::Instant>> {
        Arc::new(Session::new(
            established,
            direction,
            self.env.now(),
            self.config.lifetime,
            self.config.max_messages_per_session,
        ))
    }

    /// Live outbound session for `peer`, or a new one from `establish`.
    ///
    /// `establish` runs under the cache lock, so concurrent callers for the
    /// same peer observe exactly one creation: later callers receive the
    /// session the first one stored. Nothing is stored if `establish` fails.
    ///
    /// A message slot is reserved on the returned session. An expired or
    /// exhausted session is evicted and replaced.
    ///
    /// After [`shutdown`](Self::shutdown) every call establishes a session
    /// that is not cached.
    pub fn get_or_create<F>(
        &self,
        peer: KeyId,
        establish: F,
    ) -> Result<Acquired<E::Instant>, CoreError>
    where
        F: FnOnce() -> Result<Established, CoreError>,
    {
        let mut inner = self.lock();
        let now = self.env.now();

        if let Some(session_id) = inner.outbound.get(&peer).copied() {
            let key = (session_id, Direction::Outbound);
            if let Some(session) = inner.sessions.get(&key).cloned() {
                if !session.is_expired(now) && session.try_reserve() {
                    return Ok(Acquired { session, kem_ciphertext: None });
                }
            }
            inner.remove(key);
            inner.outbound.remove(&peer);
            tracing::debug!(session_id = %session_id, peer = %peer, "outbound session expired, rotating");
        }

        let established = establish()?;
        let kem_ciphertext = established.kem_ciphertext.clone();
        let session = self.build(established, Direction::Outbound);

        if !inner.shut_down {
            inner.sessions.insert((session.id(), Direction::Outbound), Arc::clone(&session));
            inner.outbound.insert(peer, session.id());
        }
        tracing::debug!(session_id = %session.id(), peer = %peer, "outbound session created");

        Ok(Acquired { session, kem_ciphertext: Some(kem_ciphertext) })
    }

    /// Store the session a receiver derived from an authenticated cold
    /// envelope.
    ///
    /// A live session with the same id already holds identical key material
    /// and is returned as is. An expired entry is replaced.
    pub fn establish_inbound(&self, established: Established) -> Arc<Session<E::Instant>> {
        let mut inner = self.lock();
        let now = self.env.now();
        let session_id = established.session_id;
        let key = (session_id, Direction::Inbound);

        if let Some(existing) = inner.sessions.get(&key).cloned() {
            if !existing.is_expired(now) {
                return existing;
            }
            inner.remove(key);
        }

        let session = self.build(established, Direction::Inbound);
        if !inner.shut_down {
            inner.sessions.insert(key, Arc::clone(&session));
        }
        tracing::debug!(session_id = %session_id, peer = %session.peer_key_id(), "inbound session established");

        session
    }

    /// Resolve a warm-path session reference to an inbound session.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if no inbound session has this id (an outbound
    /// session with the same id does not count) or it has expired. An
    /// expired entry is evicted on the way out.
    pub fn lookup(&self, session_id: SessionId) -> Result<Arc<Session<E::Instant>>, CoreError> {
        let mut inner = self.lock();
        let now = self.env.now();
        let key = (session_id, Direction::Inbound);

        match inner.sessions.get(&key).cloned() {
            Some(session) if !session.is_expired(now) => Ok(session),
            Some(_) => {
                inner.remove(key);
                tracing::debug!(session_id = %session_id, "session expired on lookup");
                Err(CoreError::SessionNotFound { session_id })
            },
            None => Err(CoreError::SessionNotFound { session_id }),
        }
    }

    /// Cached session by id and direction, expired or not. Never evicts.
    pub fn peek(
        &self,
        session_id: SessionId,
        direction: Direction,
    ) -> Option<Arc<Session<E::Instant>>> {
        self.lock().sessions.get(&(session_id, direction)).cloned()
    }

    /// Revoke and evict a session in both directions.
    ///
    /// Idempotent: unknown or already-expired ids are a no-op.
    pub fn revoke(&self, session_id: SessionId) {
        let keys = [(session_id, Direction::Inbound), (session_id, Direction::Outbound)];
        if self.lock().remove_all(keys) > 0 {
            tracing::debug!(session_id = %session_id, "session revoked");
        }
    }

    /// Remove every expired session.
    ///
    /// Never blocks: if another operation holds the lock the pass is skipped
    /// and reported as [`SweepOutcome::Contended`].
    pub fn sweep(&self) -> SweepOutcome {
        let mut inner = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return SweepOutcome::Contended,
        };

        let removed = inner.remove_expired(self.env.now());
        SweepOutcome::Swept { removed }
    }

    /// Sweep every `sweep_interval` until [`shutdown`](Self::shutdown).
    ///
    /// Contended passes are retried on the next tick. Dropping the future
    /// stops the loop without affecting the cache.
    pub async fn run_sweeper(&self) {
        loop {
            self.env.sleep(self.config.sweep_interval).await;

            if self.is_shut_down() {
                tracing::debug!("session sweeper stopped");
                return;
            }

            match self.sweep() {
                SweepOutcome::Swept { removed: 0 } => {},
                SweepOutcome::Swept { removed } => {
                    tracing::debug!(removed, "swept expired sessions");
                },
                SweepOutcome::Contended => {
                    tracing::trace!("session sweep contended, retrying next cycle");
                },
            }
        }
    }

    /// Destroy every session and stop caching new ones.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        let keys: Vec<Key> = inner.sessions.keys().copied().collect();
        inner.remove_all(keys);
        inner.outbound.clear();
        inner.shut_down = true;
        tracing::debug!("session manager shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Number of cached sessions, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached outbound session id for `peer`, if any.
    pub fn outbound_session(&self, peer: KeyId) -> Option<SessionId> {
        self.lock().outbound.get(&peer).copied()
    }
}
