//! Error types for the Sealroom protocol core.
//!
//! Two layers: [`StoreError`] is the vocabulary every external collaborator
//! (secure key store, key directory, message store) speaks, and
//! [`ProtocolError`] is what conversation operations surface to callers.

use sealroom_crypto::CryptoError;
use thiserror::Error;

use crate::record::{ParticipantId, RecordError};

/// Errors reported by external storage and lookup collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Requested item does not exist (e.g. no published public key)
    #[error("not found: {0}")]
    NotFound(String),

    /// Backing store could not be reached or failed mid-operation
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored bytes could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors surfaced by conversation operations.
///
/// Creation and sending abort on any of these and commit nothing. Receiving
/// reports them per message; see [`crate::ConversationProtocol::history`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Secure key store could not be read or written
    #[error("secure key store unavailable: {0}")]
    KeyStoreUnavailable(#[source] StoreError),

    /// Stored identity key bytes do not parse as a private key
    #[error("corrupt identity key material: {reason}")]
    CorruptKeyMaterial {
        /// Why the stored bytes were rejected
        reason: String,
    },

    /// AEAD tag mismatch on thread-key unwrap or message open
    #[error("authentication failed while opening {what}")]
    AuthenticationFailed {
        /// What was being opened ("thread key" or "message")
        what: &'static str,
    },

    /// Conversation has no wrapped thread key for this participant
    #[error("no thread key for participant {participant}")]
    NoThreadKeyForParticipant {
        /// Participant whose blob is missing
        participant: ParticipantId,
    },

    /// Public key lookup or validation failed for one participant
    #[error("could not resolve public key for {participant}: {reason}")]
    ParticipantKeyResolutionFailed {
        /// Participant whose key could not be used
        participant: ParticipantId,
        /// Underlying lookup or validation failure
        reason: String,
    },

    /// Durable record store rejected or failed an operation
    #[error("store operation failed: {0}")]
    StoreOperationFailed(#[source] StoreError),

    /// Record is missing fields or carries malformed values
    #[error("malformed record: {0}")]
    MalformedRecord(#[from] RecordError),

    /// Plaintext exceeds the configured size limit
    #[error("plaintext of {len} bytes exceeds limit of {max}")]
    PlaintextTooLarge {
        /// Plaintext length in bytes
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Participant set exceeds the configured limit
    #[error("{count} participants exceeds limit of {max}")]
    TooManyParticipants {
        /// Participant count including the local identity
        count: usize,
        /// Configured maximum
        max: usize,
    },
}

impl ProtocolError {
    /// Returns true if this error is transient and the caller may retry.
    ///
    /// Only store unavailability is transient. Authentication failures,
    /// missing keys and malformed records will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::KeyStoreUnavailable(err) | Self::StoreOperationFailed(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error indicates tampering or a wrong key.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

/// Maps failures of opening blobs and messages. Length errors come from
/// stored fields, so they are reported as malformed records.
impl From<CryptoError> for ProtocolError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed { what } => Self::AuthenticationFailed { what },
            CryptoError::InvalidLength { what, .. } => Self::MalformedRecord(
                RecordError::InvalidField { field: what.to_string(), reason: err.to_string() },
            ),
            CryptoError::InvalidPublicKey => Self::MalformedRecord(RecordError::InvalidField {
                field: "public key".to_string(),
                reason: err.to_string(),
            }),
            CryptoError::CorruptKeyMaterial { reason } => Self::CorruptKeyMaterial { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_stores_are_transient() {
        let err = ProtocolError::StoreOperationFailed(StoreError::Unavailable("down".into()));
        assert!(err.is_transient());

        let err = ProtocolError::KeyStoreUnavailable(StoreError::Unavailable("locked".into()));
        assert!(err.is_transient());
    }

    #[test]
    fn protocol_violations_are_not_transient() {
        assert!(!ProtocolError::AuthenticationFailed { what: "message" }.is_transient());
        assert!(
            !ProtocolError::NoThreadKeyForParticipant { participant: ParticipantId::new("a") }
                .is_transient()
        );
        assert!(
            !ProtocolError::StoreOperationFailed(StoreError::NotFound("x".into())).is_transient()
        );
    }

    #[test]
    fn crypto_auth_failure_maps_directly() {
        let err = ProtocolError::from(CryptoError::AuthenticationFailed { what: "thread key" });
        assert_eq!(err, ProtocolError::AuthenticationFailed { what: "thread key" });
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn crypto_length_error_is_malformed_record() {
        let err =
            ProtocolError::from(CryptoError::InvalidLength { what: "nonce", expected: 24, actual: 3 });
        assert!(matches!(
            err,
            ProtocolError::MalformedRecord(RecordError::InvalidField { ref field, .. }) if field == "nonce"
        ));
    }

    #[test]
    fn error_display() {
        let err = ProtocolError::NoThreadKeyForParticipant { participant: ParticipantId::new("bob") };
        assert_eq!(err.to_string(), "no thread key for participant bob");
    }
}
