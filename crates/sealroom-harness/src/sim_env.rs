//! Deterministic environment for simulation and tests.
//!
//! Randomness comes from a seeded ChaCha20 stream and time from a virtual
//! clock, so two runs with the same seed produce byte-identical identities,
//! thread keys, nonces, record ids and timestamps.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sealroom_core::Environment;

/// Virtual clock start: 2023-11-14T22:13:20Z.
pub const SIM_EPOCH_MILLIS: u64 = 1_700_000_000_000;

/// Seeded environment. Clones share the RNG stream and the clock.
///
/// The clock advances by one millisecond on every read, so timestamps of
/// successive messages are strictly increasing.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock: Arc<AtomicU64>,
}

impl SimEnv {
    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock: Arc::new(AtomicU64::new(SIM_EPOCH_MILLIS)),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance_millis(&self, millis: u64) {
        self.clock.fetch_add(millis, Ordering::SeqCst);
    }

    /// Current virtual time without advancing it.
    pub fn peek_millis(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }
}

impl Environment for SimEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().expect("SimEnv RNG mutex poisoned").fill_bytes(buffer);
    }

    fn wall_clock_millis(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }
}
