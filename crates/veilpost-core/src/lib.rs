//! Veilpost encryption core.
//!
//! Seals plaintext into [`EncryptedEnvelope`]s for a recipient's ML-KEM-1024
//! public key and opens them again. The first message to a recipient carries
//! a KEM ciphertext (cold start); later messages reuse the resulting session
//! key and carry only the session id (warm path) until the session expires,
//! is revoked or reaches its message cap.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Core<E>                                 │
//! │  generate_keypair / seal / open /       │
//! │  revoke_session                         │
//! ├───────────────────┬─────────────────────┤
//! │ codec             │ SessionManager<E>   │
//! │  aad, kem, aead   │  cache, expiry,     │
//! │                   │  sweeper            │
//! ├───────────────────┴─────────────────────┤
//! │ veilpost-crypto   │ veilpost-proto      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Time and randomness come from an [`Environment`], so the whole core runs
//! deterministically under a simulated clock and seeded RNG.
//!
//! # Transport
//!
//! The core never talks to the network. Callers hand encoded envelopes to a
//! [`Transport`] as [`OpaqueEnvelope`]s; the transport sees ciphertext and
//! routing metadata only.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codec;
pub mod config;
mod engine;
pub mod env;
pub mod error;
pub mod identity;
pub mod session;
pub mod session_manager;
pub mod transport;

#[cfg(test)]
mod testing;

pub use codec::Opened;
pub use config::{CoreConfig, SessionConfig};
pub use engine::Core;
pub use env::{EntropyError, Environment};
pub use error::CoreError;
pub use identity::{KeyPair, PublicIdentity, SenderContext};
pub use session::{Direction, Session, SessionState};
pub use session_manager::{Acquired, SessionManager, SweepOutcome};
pub use transport::{
    Ack, OpaqueEnvelope, RoutingMetadata, Transport, TransportError, accept_delivery,
};
pub use veilpost_proto::{EncryptedEnvelope, KeyExchange, KeyId, SessionId};
