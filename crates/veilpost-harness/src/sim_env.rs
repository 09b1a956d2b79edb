#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

//! Simulated environment: virtual clocks, seeded RNG, injectable entropy
//! faults.
//!
//! Time only moves when a test calls [`SimEnv::advance`] (or the sweeper
//! sleeps), so session expiry and staleness are reproducible to the
//! millisecond. Every party in a scenario may share one `SimEnv` or hold its
//! own; clones share clock and RNG.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use veilpost_core::{EntropyError, Environment};

/// Epoch milliseconds the wall clock starts at (2023-11-14).
pub const SIM_EPOCH_MILLIS: i64 = 1_700_000_000_000;

/// How the random source misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyFault {
    /// Seeded ChaCha output
    Healthy,
    /// Every call reports failure
    Unavailable,
    /// Every call succeeds with the same byte repeated
    Constant(u8),
}

struct SimState {
    elapsed: Duration,
    wall_clock_millis: i64,
    rng: ChaCha20Rng,
    fault: EntropyFault,
    random_calls: u64,
}

/// Deterministic [`Environment`].
#[derive(Clone)]
pub struct SimEnv {
    origin: Instant,
    state: Arc<Mutex<SimState>>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl SimEnv {
    /// Environment seeded with zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment whose random stream is fixed by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            origin: Instant::now(),
            state: Arc::new(Mutex::new(SimState {
                elapsed: Duration::ZERO,
                wall_clock_millis: SIM_EPOCH_MILLIS,
                rng: ChaCha20Rng::seed_from_u64(seed),
                fault: EntropyFault::Healthy,
                random_calls: 0,
            })),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the monotonic and wall clocks forward together.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state();
        state.elapsed += by;
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        state.wall_clock_millis = state.wall_clock_millis.saturating_add(millis);
    }

    /// Move only the wall clock, as a skewed device would.
    pub fn skew_wall_clock(&self, millis: i64) {
        let mut state = self.state();
        state.wall_clock_millis = state.wall_clock_millis.saturating_add(millis);
    }

    /// Time elapsed on the monotonic clock.
    pub fn elapsed(&self) -> Duration {
        self.state().elapsed
    }

    /// Switch the random source behaviour for later calls.
    pub fn inject_entropy_fault(&self, fault: EntropyFault) {
        self.state().fault = fault;
    }

    /// Number of `random_bytes` calls so far, failed ones included.
    pub fn random_calls(&self) -> u64 {
        self.state().random_calls
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        self.origin + self.state().elapsed
    }

    fn wall_clock_millis(&self) -> i64 {
        self.state().wall_clock_millis
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        tokio::task::yield_now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        let mut state = self.state();
        state.random_calls += 1;

        match state.fault {
            EntropyFault::Healthy => {
                state.rng.fill_bytes(buffer);
                Ok(())
            },
            EntropyFault::Unavailable => {
                Err(EntropyError { reason: "simulated source failure".into() })
            },
            EntropyFault::Constant(byte) => {
                buffer.fill(byte);
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let a = SimEnv::with_seed(9);
        let b = SimEnv::with_seed(9);
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];

        a.random_bytes(&mut x).unwrap();
        b.random_bytes(&mut y).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn clocks_advance_together_unless_skewed() {
        let env = SimEnv::new();
        let start = env.now();

        env.advance(Duration::from_millis(1500));
        assert_eq!(env.now() - start, Duration::from_millis(1500));
        assert_eq!(env.wall_clock_millis(), SIM_EPOCH_MILLIS + 1500);

        env.skew_wall_clock(-10_000);
        assert_eq!(env.now() - start, Duration::from_millis(1500));
        assert_eq!(env.wall_clock_millis(), SIM_EPOCH_MILLIS - 8500);
    }

    #[test]
    fn faults_apply_to_later_calls() {
        let env = SimEnv::new();
        let mut buf = [0u8; 8];

        env.inject_entropy_fault(EntropyFault::Constant(0xAB));
        env.random_bytes(&mut buf).unwrap();
        assert_eq!(buf, [0xAB; 8]);

        env.inject_entropy_fault(EntropyFault::Unavailable);
        assert!(env.random_bytes(&mut buf).is_err());
        assert_eq!(env.random_calls(), 2);
    }
}
