//! Conversation-scoped symmetric keys

use std::fmt;

use zeroize::Zeroize;

use crate::error::CryptoError;

/// Size of a thread key (256 bits)
pub const THREAD_KEY_SIZE: usize = 32;

/// The 256-bit symmetric key that seals every message in one conversation.
///
/// Only ever held transiently by the operation that unwrapped it. Not
/// `Clone`; key bytes are zeroized on drop.
pub struct ThreadKey {
    key: [u8; THREAD_KEY_SIZE],
}

impl ThreadKey {
    /// Wrap fresh key bytes.
    ///
    /// Callers generating a new conversation MUST supply cryptographically
    /// secure random bytes.
    pub fn from_bytes(key: [u8; THREAD_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Parse key bytes recovered from an unwrapped blob.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; THREAD_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                what: "thread key",
                expected: THREAD_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self { key })
    }

    /// Raw key bytes for the AEAD.
    pub fn as_bytes(&self) -> &[u8; THREAD_KEY_SIZE] {
        &self.key
    }
}

impl Drop for ThreadKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ThreadKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(ThreadKey::from_slice(&[0u8; 32]).is_ok());
        assert!(matches!(
            ThreadKey::from_slice(&[0u8; 16]),
            Err(CryptoError::InvalidLength { what: "thread key", expected: 32, actual: 16 })
        ));
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let key = ThreadKey::from_bytes([0x5A; 32]);
        assert_eq!(format!("{key:?}"), "ThreadKey(<redacted>)");
    }
}
