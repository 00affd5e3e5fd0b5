//! Error types for Sealroom cryptographic operations

use thiserror::Error;

/// Errors from key agreement, key wrapping and message sealing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// AEAD tag did not verify (wrong key, tampered bytes, or mismatched
    /// nonce/ciphertext pairing)
    #[error("authentication failed while opening {what}")]
    AuthenticationFailed {
        /// What was being opened ("thread key" or "message")
        what: &'static str,
    },

    /// An opaque byte field has the wrong length
    #[error("invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Which field was malformed
        what: &'static str,
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Peer public key produced a non-contributory (all-zero) shared secret
    #[error("public key is not usable for key agreement")]
    InvalidPublicKey,

    /// Stored private key bytes could not be parsed
    #[error("corrupt key material: {reason}")]
    CorruptKeyMaterial {
        /// Why the bytes were rejected
        reason: String,
    },
}

impl CryptoError {
    /// Returns true if this error indicates tampering or a wrong key.
    ///
    /// Length errors are reported separately because they are detected
    /// before any cryptographic check runs.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}
