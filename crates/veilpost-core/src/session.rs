//! Ephemeral session state.
//!
//! A session caches the key material derived from one KEM exchange so later
//! messages between the same pair skip encapsulation.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐  warm use   ┌────────┐
//! │ Created │────────────>│ Active │
//! └─────────┘             └────────┘
//!      │                       │
//!      │ lifetime / message cap / revoke / shutdown
//!      ↓                       ↓
//!                ┌─────────┐
//!                │ Expired │
//!                └─────────┘
//! ```
//!
//! State is derived from the creation time, the use counter and the revoked
//! flag, so a session handed out as `Arc<Session>` can be read without the
//! manager's lock. Nothing ever clears the revoked flag or rewinds time,
//! so `Expired` is terminal.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use veilpost_crypto::{KemCiphertext, KeyMaterial};
use veilpost_proto::{KeyId, SessionId};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Established by a KEM exchange, no warm-path message yet
    Created,
    /// At least one warm-path message used the session key
    Active,
    /// Lifetime elapsed, message cap reached, or revoked
    Expired,
}

/// Which side created the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// We encapsulated; the peer is the recipient
    Outbound,
    /// We decapsulated; the peer is the sender
    Inbound,
}

/// Cached key material for one KEM exchange.
///
/// Key material is zeroized when the last reference drops.
#[derive(Debug)]
pub struct Session<I> {
    id: SessionId,
    direction: Direction,
    peer_key_id: KeyId,
    key_material: KeyMaterial,
    kem_ciphertext: KemCiphertext,
    created_at: I,
    expires_at: I,
    max_messages: u64,
    uses: AtomicU64,
    revoked: AtomicBool,
}

/// Inputs for a new session.
#[derive(Debug)]
pub struct Established {
    /// Identifier derived from the KEM ciphertext
    pub session_id: SessionId,
    /// Recipient (outbound) or sender (inbound) key id
    pub peer_key_id: KeyId,
    /// Derived AEAD key and MAC context
    pub key_material: KeyMaterial,
    /// Ciphertext that carried the shared secret
    pub kem_ciphertext: KemCiphertext,
}

impl<I> Session<I>
where
    I: Copy + Ord + std::ops::Add<std::time::Duration, Output = I>,
{
    /// Create a session at `now`, valid for `lifetime`.
    ///
    /// The establishing message counts as the first use.
    pub fn new(
        established: Established,
        direction: Direction,
        now: I,
        lifetime: std::time::Duration,
        max_messages: u64,
    ) -> Self {
        Self {
            id: established.session_id,
            direction,
            peer_key_id: established.peer_key_id,
            key_material: established.key_material,
            kem_ciphertext: established.kem_ciphertext,
            created_at: now,
            expires_at: now + lifetime,
            max_messages,
            uses: AtomicU64::new(1),
            revoked: AtomicBool::new(false),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Which side created the session.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Key id of the other party.
    pub fn peer_key_id(&self) -> KeyId {
        self.peer_key_id
    }

    /// Derived key material.
    pub fn key_material(&self) -> &KeyMaterial {
        &self.key_material
    }

    /// KEM ciphertext that established the session (public).
    pub fn kem_ciphertext(&self) -> &KemCiphertext {
        &self.kem_ciphertext
    }

    /// Creation instant.
    pub fn created_at(&self) -> I {
        self.created_at
    }

    /// Instant at which the session expires.
    pub fn expires_at(&self) -> I {
        self.expires_at
    }

    /// Messages protected so far (cold start included).
    pub fn uses(&self) -> u64 {
        self.uses.load(Ordering::Acquire)
    }

    /// Current state.
    pub fn state(&self, now: I) -> SessionState {
        if self.is_expired(now) {
            SessionState::Expired
        } else if self.uses() > 1 {
            SessionState::Active
        } else {
            SessionState::Created
        }
    }

    /// Whether the session can no longer be used.
    pub fn is_expired(&self, now: I) -> bool {
        self.revoked.load(Ordering::Acquire)
            || now >= self.expires_at
            || self.uses() >= self.max_messages
    }

    /// Whether the session was explicitly revoked.
    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Claim one message slot for sealing. `false` once the cap is reached.
    pub(crate) fn try_reserve(&self) -> bool {
        self.uses
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_messages).then_some(n + 1)
            })
            .is_ok()
    }

    /// Count a successfully opened warm-path message.
    pub(crate) fn record_use(&self) {
        self.uses.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark as revoked. Idempotent.
    pub(crate) fn revoke(&self) {
        self.revoked.store(true, Ordering::Release);
    }
}
