//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (wall clock, randomness).
//! Production code uses OS entropy and system time; tests use a seeded RNG
//! and a virtual clock so every run is reproducible.

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `wall_clock_millis()` is milliseconds since the Unix epoch
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Used for message timestamps only, never for protocol decisions.
    fn wall_clock_millis(&self) -> u64;

    /// Fixed-size array of random bytes.
    ///
    /// Convenience for nonces and key material.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }

    /// Generates a random `u128`.
    ///
    /// Useful for record identifiers.
    fn random_u128(&self) -> u128 {
        u128::from_be_bytes(self.random_array())
    }
}
