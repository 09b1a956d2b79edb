//! Environment abstraction for deterministic testing.
//!
//! Decouples the core from system resources (clocks, randomness). Enables
//! deterministic simulation (virtual clock, seeded RNG, injected entropy
//! faults) and production use with real system resources.

use std::{
    fmt::Debug,
    ops::{Add, Sub},
    time::Duration,
};

use thiserror::Error;

/// The platform random source could not deliver bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("random source unavailable: {reason}")]
pub struct EntropyError {
    /// Description from the underlying source
    pub reason: String,
}

/// Abstract environment providing time, randomness, and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `random_bytes()` reports failure rather than returning a partially
///   filled or predictable buffer
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use virtual time.
    type Instant: Copy
        + Ord
        + Debug
        + Send
        + Sync
        + Sub<Output = Duration>
        + Add<Duration, Output = Self::Instant>;

    /// Current time (monotonic). Drives session expiry.
    ///
    /// # Invariants
    ///
    /// - This method MUST return values that never decrease within a single
    ///   execution context.
    fn now(&self) -> Self::Instant;

    /// Wall-clock time as epoch milliseconds.
    ///
    /// Only used for the informational envelope timestamp and staleness
    /// flag, never for expiry.
    fn wall_clock_millis(&self) -> i64;

    /// Sleeps for the specified duration.
    ///
    /// Only used by driver code (the session sweeper), never by seal/open.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Errors
    ///
    /// `EntropyError` if the source is unavailable. The buffer contents are
    /// unspecified on error and must not be used.
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError>;

    /// Generates a random `u128`.
    ///
    /// Useful for key identifiers.
    fn random_u128(&self) -> Result<u128, EntropyError> {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes)?;
        Ok(u128::from_be_bytes(bytes))
    }
}
