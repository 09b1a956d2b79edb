//! Long-running host for the encryption core.
//!
//! A [`Node`] owns a `Core<SystemEnv>`, the worker pool that runs seal/open
//! off the async executor, and the background task that sweeps expired
//! sessions. Shutting it down (explicitly or by dropping it) stops the
//! sweeper, closes the pool and destroys every cached session.

use std::{sync::Arc, thread};

use tokio::task::JoinHandle;
use veilpost_core::{
    Core, CoreConfig, EncryptedEnvelope, KeyPair, Opened, PublicIdentity, SenderContext, SessionId,
};

use crate::{error::NodeError, system_env::SystemEnv, worker_pool::WorkerPool};

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Core and session policy
    pub core: CoreConfig,
    /// Concurrent seal/open jobs
    pub workers: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            workers: thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        }
    }
}

/// Running encryption node.
pub struct Node {
    core: Core<SystemEnv>,
    pool: WorkerPool,
    sweeper: Option<JoinHandle<()>>,
}

impl Node {
    /// Start a node. Must be called within a tokio runtime.
    pub fn start(config: NodeConfig) -> Self {
        let core = Core::new(SystemEnv::new(), config.core);
        let pool = WorkerPool::new(config.workers);

        let sessions = core.sessions().clone();
        let sweeper = tokio::spawn(async move { sessions.run_sweeper().await });

        tracing::info!(
            workers = pool.workers(),
            lifetime_secs = core.config().session.lifetime.as_secs(),
            "node started"
        );

        Self { core, pool, sweeper: Some(sweeper) }
    }

    /// Underlying core, for synchronous callers.
    pub fn core(&self) -> &Core<SystemEnv> {
        &self.core
    }

    /// Generate a keypair on the worker pool.
    pub async fn generate_keypair(&self) -> Result<KeyPair, NodeError> {
        let core = self.core.clone();
        Ok(self.pool.run(move || core.generate_keypair()).await??)
    }

    /// Seal on the worker pool.
    pub async fn seal(
        &self,
        plaintext: Vec<u8>,
        recipient: PublicIdentity,
        sender: SenderContext,
    ) -> Result<EncryptedEnvelope, NodeError> {
        let core = self.core.clone();
        let plaintext = zeroize::Zeroizing::new(plaintext);
        Ok(self.pool.run(move || core.seal(&plaintext, &recipient, &sender)).await??)
    }

    /// Open on the worker pool.
    pub async fn open(
        &self,
        envelope: EncryptedEnvelope,
        recipient: Arc<KeyPair>,
    ) -> Result<Opened, NodeError> {
        let core = self.core.clone();
        Ok(self.pool.run(move || core.open(&envelope, &recipient)).await??)
    }

    /// Destroy a session. Idempotent.
    pub fn revoke_session(&self, session_id: SessionId) {
        self.core.revoke_session(session_id);
    }

    /// Stop the sweeper, refuse new jobs and destroy all sessions.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
            self.pool.close();
            self.core.sessions().shutdown();
            tracing::info!("node shut down");
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.sweeper.is_none()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}
