//! Thread-key wrapping via X25519 + HKDF
//!
//! The initiator wraps the thread key for each participant under a key
//! derived from `(initiator_secret, participant_public)`. Each participant
//! rederives the same key from `(participant_secret, initiator_public)`.
//! Wrapping and unwrapping MUST both go through [`derive_wrapping_key`]; raw
//! public key bytes are never used as a symmetric key.
//!
//! Blob wire format:
//!
//! ```text
//! [ nonce (24 bytes) | sealed thread key (32 bytes) | tag (16 bytes) ]
//! ```

use std::fmt;

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::{
    cipher::{NONCE_SIZE, TAG_SIZE},
    error::CryptoError,
    identity::{IdentityKeyPair, IdentityPublicKey},
    thread_key::{THREAD_KEY_SIZE, ThreadKey},
};

/// HKDF salt for wrapping-key derivation (domain separation)
pub const WRAP_SALT: &[u8] = b"sealroom-thread-key";

/// Associated data bound to every wrapped blob
const WRAP_ASSOCIATED_DATA: &[u8] = b"sealroom-thread-key-wrap-v1";

/// Total size of a wrapped thread-key blob (72 bytes)
pub const WRAPPED_KEY_SIZE: usize = NONCE_SIZE + THREAD_KEY_SIZE + TAG_SIZE;

/// Symmetric key used only to seal and open one participant's thread-key
/// blob.
pub struct WrappingKey {
    key: [u8; 32],
}

impl WrappingKey {
    /// Raw key bytes for the AEAD.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl Drop for WrappingKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WrappingKey(<redacted>)")
    }
}

/// Derive the wrapping key shared by `my_key_pair` and `their_public`.
///
/// `derive(A, B.pub) == derive(B, A.pub)` for any two key pairs, which is
/// what lets a participant unwrap with only the initiator's public key.
///
/// # Errors
///
/// - `InvalidPublicKey` if `their_public` is a low-order point
pub fn derive_wrapping_key(
    my_key_pair: &IdentityKeyPair,
    their_public: &IdentityPublicKey,
) -> Result<WrappingKey, CryptoError> {
    let shared = my_key_pair.agree(their_public)?;

    let hkdf = Hkdf::<Sha256>::new(Some(WRAP_SALT), shared.as_slice());

    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(&[], &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    Ok(WrappingKey { key })
}

/// Seal a thread key under a wrapping key, producing a combined blob.
///
/// Caller MUST provide fresh random nonce bytes.
pub fn wrap_thread_key(
    thread_key: &ThreadKey,
    wrapping_key: &WrappingKey,
    nonce: [u8; NONCE_SIZE],
) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(wrapping_key.as_bytes().into());
    let payload = Payload { msg: thread_key.as_bytes(), aad: WRAP_ASSOCIATED_DATA };

    let Ok(sealed) = cipher.encrypt(XNonce::from_slice(&nonce), payload) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut blob = Vec::with_capacity(WRAPPED_KEY_SIZE);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);

    debug_assert_eq!(blob.len(), WRAPPED_KEY_SIZE);
    blob
}

/// Open a wrapped blob and recover the thread key.
///
/// # Errors
///
/// - `InvalidLength`: blob is not [`WRAPPED_KEY_SIZE`] bytes
/// - `AuthenticationFailed`: wrong wrapping key or corrupted blob
pub fn unwrap_thread_key(blob: &[u8], wrapping_key: &WrappingKey) -> Result<ThreadKey, CryptoError> {
    if blob.len() != WRAPPED_KEY_SIZE {
        return Err(CryptoError::InvalidLength {
            what: "wrapped thread key",
            expected: WRAPPED_KEY_SIZE,
            actual: blob.len(),
        });
    }

    let (nonce, sealed) = blob.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(wrapping_key.as_bytes().into());
    let payload = Payload { msg: sealed, aad: WRAP_ASSOCIATED_DATA };

    let key_bytes = Zeroizing::new(
        cipher
            .decrypt(XNonce::from_slice(nonce), payload)
            .map_err(|_| CryptoError::AuthenticationFailed { what: "thread key" })?,
    );

    ThreadKey::from_slice(&key_bytes)
}
