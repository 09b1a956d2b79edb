//! Node error types.

use std::path::PathBuf;

use thiserror::Error;
use veilpost_core::CoreError;
use veilpost_proto::EnvelopeError;

/// Errors surfaced by the node runtime and the CLI.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Encryption core rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Envelope could not be encoded or decoded.
    #[error("envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Key file is unreadable or malformed.
    ///
    /// The message names the file and the field, never key bytes.
    #[error("key file {path}: {reason}")]
    KeyFile {
        /// File being read or written
        path: PathBuf,
        /// What was wrong
        reason: String,
    },

    /// Filesystem or stdio failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Worker task panicked or was cancelled by the runtime.
    #[error("worker failed: {0}")]
    Worker(String),

    /// Node has been shut down.
    #[error("node is shut down")]
    ShutDown,
}

impl NodeError {
    pub(crate) fn key_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::KeyFile { path: path.into(), reason: reason.into() }
    }
}
