//! Production environment using the system clock and OS randomness.
//!
//! Not reproducible. Simulation and tests that need determinism use a
//! seeded environment instead.

use std::time::{SystemTime, UNIX_EPOCH};

use sealroom_core::Environment;

/// Production environment using the system wall clock and getrandom.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without working randomness no identity key,
/// thread key or nonce can be generated safely, so continuing is not an
/// option.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}
