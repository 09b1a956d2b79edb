//! Tunables for sessions and the seal/open codec.

use std::time::Duration;

/// How long a session key may be reused.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Messages per session before rotation.
///
/// With 96-bit random nonces, 2^32 messages keep the collision probability
/// under 2^-32.
pub const DEFAULT_MAX_MESSAGES_PER_SESSION: u64 = 1 << 32;

/// Interval between background sweeps of expired sessions.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Age after which an opened envelope is flagged as stale.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Session manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time from creation until a session expires
    pub lifetime: Duration,
    /// Messages (cold start included) a session may protect
    pub max_messages_per_session: u64,
    /// Background sweep interval
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_SESSION_LIFETIME,
            max_messages_per_session: DEFAULT_MAX_MESSAGES_PER_SESSION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Core configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Session policy
    pub session: SessionConfig,
    /// Staleness window for the `stale` flag on opened envelopes
    pub staleness_window: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self { session: SessionConfig::default(), staleness_window: DEFAULT_STALENESS_WINDOW }
    }
}

impl CoreConfig {
    /// Defaults with a custom session policy.
    pub fn with_session(session: SessionConfig) -> Self {
        Self { session, ..Self::default() }
    }
}
