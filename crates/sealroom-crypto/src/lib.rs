//! Sealroom Cryptographic Primitives
//!
//! Cryptographic building blocks for Sealroom conversations. Pure functions
//! with deterministic outputs. Callers provide random bytes (secret scalars,
//! thread keys, nonces) so that tests can run deterministically.
//!
//! # Key Lifecycle
//!
//! Each conversation has one thread key, generated by the initiator. The
//! thread key is wrapped once per participant under a wrapping key derived
//! from an X25519 agreement between the initiator and that participant.
//!
//! ```text
//! Initiator secret ──┐                       ┌── Participant secret
//!                    ▼                       ▼
//!     X25519(init, part.pub)  ==  X25519(part, init.pub)
//!                    │
//!                    ▼ HKDF-SHA256 (salt "sealroom-thread-key")
//!              Wrapping Key
//!                    │
//!                    ▼ XChaCha20-Poly1305
//!     Wrapped blob = nonce ‖ sealed thread key ‖ tag
//!
//! Thread Key ──▶ XChaCha20-Poly1305 (fresh nonce) ──▶ (ciphertext, nonce, tag)
//! ```
//!
//! # Security
//!
//! Confidentiality:
//! - Only holders of a participant secret can rederive that participant's
//!   wrapping key
//! - Thread keys and wrapping keys are zeroized on drop
//!
//! Authenticity:
//! - Every blob and every message carries a Poly1305 tag
//! - Failed tag verification -> `AuthenticationFailed`, never altered
//!   plaintext
//!
//! Nonces:
//! - 24-byte `XChaCha20` nonces; random nonces do not realistically collide
//!   under one key

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod error;
pub mod identity;
pub mod thread_key;
pub mod wrap;

pub use cipher::{NONCE_SIZE, SealedMessage, TAG_SIZE, open_message, seal_message};
pub use error::CryptoError;
pub use identity::{
    IdentityKeyPair, IdentityPublicKey, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE,
};
pub use thread_key::{THREAD_KEY_SIZE, ThreadKey};
pub use wrap::{
    WRAP_SALT, WRAPPED_KEY_SIZE, WrappingKey, derive_wrapping_key, unwrap_thread_key,
    wrap_thread_key,
};
