//! Message sealing using `XChaCha20-Poly1305`
//!
//! Ciphertext, nonce and tag are kept as separate fields because message
//! records store them independently. Nonce bytes are supplied by the caller
//! and MUST be fresh for every call under the same thread key.

use chacha20poly1305::{
    Tag, XChaCha20Poly1305, XNonce,
    aead::{AeadInPlace, KeyInit},
};

use crate::{error::CryptoError, thread_key::ThreadKey};

/// Size of the `XChaCha20` nonce (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// A sealed message with its detached nonce and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
    /// The 24-byte nonce used for this message
    pub nonce: [u8; NONCE_SIZE],
    /// The 16-byte Poly1305 authentication tag
    pub tag: [u8; TAG_SIZE],
}

impl SealedMessage {
    /// Open this message with the thread key it was sealed under.
    pub fn open(&self, key: &ThreadKey) -> Result<Vec<u8>, CryptoError> {
        open_message(&self.ciphertext, &self.nonce, &self.tag, key)
    }
}

/// Seal a plaintext under a thread key.
///
/// # Security
///
/// - Caller MUST provide a nonce that was never used with this key before;
///   24 uniformly random bytes make collisions negligible
/// - Authenticated encryption prevents undetected tampering
pub fn seal_message(plaintext: &[u8], key: &ThreadKey, nonce: [u8; NONCE_SIZE]) -> SealedMessage {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut buffer = plaintext.to_vec();
    let Ok(tag) = cipher.encrypt_in_place_detached(XNonce::from_slice(&nonce), &[], &mut buffer)
    else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);

    SealedMessage { ciphertext: buffer, nonce, tag: tag_bytes }
}

/// Open a sealed message from its stored fields.
///
/// # Errors
///
/// - `InvalidLength`: nonce or tag field has the wrong size
/// - `AuthenticationFailed`: tag does not verify (tamper, wrong key, or
///   wrong nonce/ciphertext pairing)
pub fn open_message(
    ciphertext: &[u8],
    nonce: &[u8],
    tag: &[u8],
    key: &ThreadKey,
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidLength {
            what: "nonce",
            expected: NONCE_SIZE,
            actual: nonce.len(),
        });
    }
    if tag.len() != TAG_SIZE {
        return Err(CryptoError::InvalidLength {
            what: "tag",
            expected: TAG_SIZE,
            actual: tag.len(),
        });
    }

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let mut buffer = ciphertext.to_vec();

    cipher
        .decrypt_in_place_detached(XNonce::from_slice(nonce), &[], &mut buffer, Tag::from_slice(tag))
        .map_err(|_| CryptoError::AuthenticationFailed { what: "message" })?;

    Ok(buffer)
}
