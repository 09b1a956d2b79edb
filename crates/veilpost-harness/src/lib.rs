//! Deterministic simulation harness for Veilpost.
//!
//! Simulated implementations of the [`Environment`](veilpost_core::Environment)
//! and [`Transport`](veilpost_core::Transport) traits for reproducible
//! end-to-end testing: a virtual clock with seeded randomness and entropy
//! fault injection, and an in-memory relay with delivery faults.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks relay storage against what the endpoints
//! know. Use [`InvariantRegistry::standard()`] after any scenario to verify
//! that the relay never held plaintext or key material and that every
//! stored envelope is well-formed and correctly bound.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod party;
pub mod sim_env;
pub mod sim_relay;
pub mod world;

pub use invariants::{
    AadBindsHeader, EnvelopesWellFormed, Invariant, InvariantRegistry, InvariantResult,
    NonceUniqueness, PlaintextNeverStored, SecretSample, SecretsNeverStored, TrafficSnapshot,
    Violation,
};
pub use party::{Inbox, Party, SendError, Sent};
pub use sim_env::{EntropyFault, SIM_EPOCH_MILLIS, SimEnv};
pub use sim_relay::{Delivery, RelayFault, SimRelay};
pub use world::{SimWorld, WORLD_CHAT_ID, session_of};
