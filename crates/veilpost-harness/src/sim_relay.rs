#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

//! In-memory store-and-forward relay.
//!
//! Implements the [`Transport`] contract with nothing but opaque bytes and
//! routing metadata: it keeps a write-ahead log of every envelope accepted
//! and per-recipient mailboxes. Faults (corruption, truncation, loss,
//! duplication) are applied on delivery, never to the stored log, so tests
//! can check both what the relay kept and what the recipient received.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use veilpost_core::{Ack, OpaqueEnvelope, RoutingMetadata, Transport, TransportError};

/// Delivery-time fault applied to the next envelope fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFault {
    /// Flip one bit; offsets past the end hit the last byte
    FlipBit {
        /// Byte offset
        offset: usize,
        /// Bit within the byte (0-7)
        bit: u8,
    },
    /// Keep only the first `len` bytes
    Truncate {
        /// Bytes kept
        len: usize,
    },
    /// Lose the envelope
    Drop,
    /// Deliver the envelope twice
    Duplicate,
}

/// One envelope handed to a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Relay-assigned sequence
    pub sequence: u64,
    /// Routing the sender supplied
    pub routing: RoutingMetadata,
    /// Bytes as delivered (possibly faulted)
    pub envelope: OpaqueEnvelope,
}

struct RelayInner {
    next_sequence: u64,
    log: Vec<(u64, RoutingMetadata, OpaqueEnvelope)>,
    mailboxes: HashMap<u64, VecDeque<Delivery>>,
    faults: VecDeque<RelayFault>,
    unreachable: HashSet<u64>,
    available: bool,
}

/// Relay shared by every party in a scenario. Clones share state.
#[derive(Clone)]
pub struct SimRelay {
    inner: Arc<Mutex<RelayInner>>,
}

impl Default for SimRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRelay {
    /// Empty relay, accepting everything.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RelayInner {
                next_sequence: 1,
                log: Vec::new(),
                mailboxes: HashMap::new(),
                faults: VecDeque::new(),
                unreachable: HashSet::new(),
                available: true,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RelayInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a fault for the next fetched envelope.
    pub fn inject_fault(&self, fault: RelayFault) {
        self.lock().faults.push_back(fault);
    }

    /// Refuse envelopes addressed to `recipient_id`.
    pub fn mark_unreachable(&self, recipient_id: u64) {
        self.lock().unreachable.insert(recipient_id);
    }

    /// Toggle whether the relay answers at all.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Drain the mailbox of `recipient_id`, applying queued faults.
    pub fn fetch(&self, recipient_id: u64) -> Vec<Delivery> {
        let mut inner = self.lock();
        let pending: Vec<Delivery> =
            inner.mailboxes.get_mut(&recipient_id).map(|q| q.drain(..).collect()).unwrap_or_default();

        let mut delivered = Vec::with_capacity(pending.len());
        for delivery in pending {
            match inner.faults.pop_front() {
                None => delivered.push(delivery),
                Some(RelayFault::Drop) => {
                    tracing::debug!(sequence = delivery.sequence, "relay dropped envelope");
                },
                Some(RelayFault::Duplicate) => {
                    delivered.push(delivery.clone());
                    delivered.push(delivery);
                },
                Some(RelayFault::FlipBit { offset, bit }) => {
                    let mut bytes = delivery.envelope.as_bytes().to_vec();
                    if !bytes.is_empty() {
                        let index = offset.min(bytes.len() - 1);
                        bytes[index] ^= 1 << (bit % 8);
                    }
                    delivered.push(Delivery {
                        envelope: OpaqueEnvelope::from_bytes(bytes),
                        ..delivery
                    });
                },
                Some(RelayFault::Truncate { len }) => {
                    let bytes = delivery.envelope.as_bytes();
                    let kept = bytes[..len.min(bytes.len())].to_vec();
                    delivered.push(Delivery {
                        envelope: OpaqueEnvelope::from_bytes(kept),
                        ..delivery
                    });
                },
            }
        }
        delivered
    }

    /// Every envelope accepted so far, as stored.
    pub fn stored(&self) -> Vec<OpaqueEnvelope> {
        self.lock().log.iter().map(|(_, _, envelope)| envelope.clone()).collect()
    }

    /// Number of envelopes accepted.
    pub fn stored_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Envelopes waiting for `recipient_id`.
    pub fn pending(&self, recipient_id: u64) -> usize {
        self.lock().mailboxes.get(&recipient_id).map_or(0, VecDeque::len)
    }
}

impl Transport for SimRelay {
    fn store_and_route(
        &self,
        envelope: OpaqueEnvelope,
        routing: RoutingMetadata,
    ) -> Result<Ack, TransportError> {
        let mut inner = self.lock();

        if !inner.available {
            return Err(TransportError::Unavailable { reason: "relay offline".into() });
        }
        if inner.unreachable.contains(&routing.recipient_id) {
            return Err(TransportError::Rejected {
                reason: format!("unknown recipient {}", routing.recipient_id),
            });
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.log.push((sequence, routing, envelope.clone()));
        inner
            .mailboxes
            .entry(routing.recipient_id)
            .or_default()
            .push_back(Delivery { sequence, routing, envelope });

        tracing::trace!(
            sequence,
            sender_id = routing.sender_id,
            recipient_id = routing.recipient_id,
            "relay stored envelope"
        );

        Ok(Ack { sequence })
    }
}
