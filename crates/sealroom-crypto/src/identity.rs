//! Long-term X25519 identity keys
//!
//! Generation is pure: the caller supplies 32 random bytes and the key pair
//! is derived from them. Persisting and reloading the secret bytes yields the
//! same key pair.

use std::fmt;

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Size of an X25519 public key (32 bytes)
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an X25519 secret scalar (32 bytes)
pub const SECRET_KEY_SIZE: usize = 32;

/// Published half of an identity key pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityPublicKey([u8; PUBLIC_KEY_SIZE]);

impl IdentityPublicKey {
    /// Wrap raw public key bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a public key from an opaque byte field.
    ///
    /// # Errors
    ///
    /// - `InvalidLength` if the slice is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidLength {
                what: "public key",
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            }
        })?;
        Ok(Self(raw))
    }

    /// Raw 32-byte representation.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Owned copy of the raw bytes, as stored in records.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityPublicKey(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// Long-term X25519 key-agreement key pair for one local identity.
///
/// The secret scalar is zeroized on drop.
#[derive(Clone)]
pub struct IdentityKeyPair {
    secret: StaticSecret,
    public: IdentityPublicKey,
}

impl IdentityKeyPair {
    /// Derive a key pair from 32 secret bytes.
    ///
    /// Callers generating a new identity MUST supply cryptographically secure
    /// random bytes.
    pub fn from_secret_bytes(secret: [u8; SECRET_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(secret);
        let public = IdentityPublicKey(PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    /// Rebuild a key pair from bytes previously returned by
    /// [`secret_bytes`](Self::secret_bytes).
    ///
    /// # Errors
    ///
    /// - `CorruptKeyMaterial` if the bytes are not 32 bytes long or are all
    ///   zero (a wiped or never-written slot)
    pub fn from_stored(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; SECRET_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::CorruptKeyMaterial {
                reason: format!("expected {SECRET_KEY_SIZE} bytes, got {}", bytes.len()),
            })?;

        if raw.iter().all(|&b| b == 0) {
            return Err(CryptoError::CorruptKeyMaterial { reason: "key bytes are all zero".into() });
        }

        Ok(Self::from_secret_bytes(raw))
    }

    /// Public half, safe to publish.
    pub fn public_key(&self) -> IdentityPublicKey {
        self.public
    }

    /// Secret bytes for persistence in a secure store.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_SIZE]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// X25519 agreement with a peer public key.
    ///
    /// Rejects low-order peer points that force an all-zero shared secret.
    pub(crate) fn agree(
        &self,
        their_public: &IdentityPublicKey,
    ) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*their_public.as_bytes()));
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(Zeroizing::new(*shared.as_bytes()))
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.public)
            .field("secret", &"<redacted>")
            .finish()
    }
}
