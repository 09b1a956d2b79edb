//! Veilpost node runtime.
//!
//! Hosts the encryption core in a real process: operating-system time and
//! randomness ([`SystemEnv`]) and a bounded pool that keeps KEM and AEAD
//! work off the async executor ([`WorkerPool`]). [`Node`] ties them to a
//! background session sweeper. Key and envelope files live in [`keyfile`]
//! and [`envelope_file`].
//!
//! The `veilpost` binary is a thin CLI over these pieces.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope_file;
pub mod error;
pub mod keyfile;
pub mod node;
pub mod system_env;
pub mod worker_pool;

pub use envelope_file::{EnvelopeFormat, EnvelopeSummary, decode_envelope, encode_envelope};
pub use error::NodeError;
pub use keyfile::{KeyFilePaths, load_keypair, load_public_identity, save_keypair};
pub use node::{Node, NodeConfig};
pub use system_env::SystemEnv;
pub use worker_pool::WorkerPool;
