//! Deterministic environment for unit tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use veilpost_crypto::{KeyMaterial, MESSAGE_PURPOSE, derive_key_material, encapsulate, generate_keypair};

use crate::{
    env::{EntropyError, Environment},
    error::CoreError,
};

/// Virtual clock on top of a fixed base instant, seeded ChaCha RNG.
#[derive(Clone)]
pub(crate) struct TestEnv {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
    wall_clock: Arc<AtomicI64>,
    rng: Arc<Mutex<ChaCha20Rng>>,
    entropy_budget: Arc<AtomicU64>,
}

impl TestEnv {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
            wall_clock: Arc::new(AtomicI64::new(1_700_000_000_000)),
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            entropy_budget: Arc::new(AtomicU64::new(u64::MAX)),
        }
    }

    /// Move both clocks forward.
    pub(crate) fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
        self.wall_clock.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    /// Make every later `random_bytes` call fail.
    pub(crate) fn fail_entropy(&self) {
        self.fail_entropy_after(0);
    }

    /// Let `calls` more `random_bytes` calls succeed, then fail the rest.
    pub(crate) fn fail_entropy_after(&self, calls: u64) {
        self.entropy_budget.store(calls, Ordering::SeqCst);
    }

    /// Undo any injected entropy failure.
    pub(crate) fn restore_entropy(&self) {
        self.entropy_budget.store(u64::MAX, Ordering::SeqCst);
    }

    /// Key material from a real KEM exchange.
    pub(crate) fn key_material(&self) -> Result<KeyMaterial, CoreError> {
        let mut seed = [0u8; 32];
        let mut coins = [0u8; 32];
        self.random_bytes(&mut seed)?;
        self.random_bytes(&mut coins)?;

        let pair = generate_keypair(&seed)?;
        let sent = encapsulate(pair.public_key.as_bytes(), &coins)?;
        Ok(derive_key_material(&sent.shared_secret, &[0; 16], MESSAGE_PURPOSE))
    }
}

impl Environment for TestEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    fn wall_clock_millis(&self) -> i64 {
        self.wall_clock.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        tokio::task::yield_now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        let granted = self
            .entropy_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                u64::MAX => Some(u64::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if !granted {
            return Err(EntropyError { reason: "injected failure".into() });
        }
        self.rng.lock().unwrap().fill_bytes(buffer);
        Ok(())
    }
}
