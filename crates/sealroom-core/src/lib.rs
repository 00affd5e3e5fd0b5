//! Sealroom Protocol Core
//!
//! End-to-end encrypted group conversations over an untrusted record store.
//! The store sees ciphertext, nonces, tags and wrapped keys; it can drop or
//! reorder records but cannot read or undetectably alter them.
//!
//! # Architecture
//!
//! All I/O goes through injected collaborators defined in [`boundary`]:
//!
//! - [`SecureKeyStore`]: local secret storage for the identity key
//! - [`PublicKeyResolver`] / [`PublicKeyPublisher`]: directory of identity
//!   public keys
//! - [`MessageStore`]: durable conversation and message records
//!
//! Randomness and time come from an [`Environment`], so the whole protocol
//! runs deterministically under simulation.
//!
//! # Components
//!
//! - [`IdentityKeyStore`]: lazily generated, persisted, cached identity key
//! - [`ConversationProtocol`]: conversation creation, send and receive
//! - [`MessageFeed`]: live decrypted stream that skips bad records
//! - [`wire`]: persisted encoding of the thread-key blob map
//!
//! # Failure Model
//!
//! Creating a conversation or sending a message performs all cryptographic
//! work first and writes exactly once, so failures never leave partial
//! records. Receiving treats every inbound record as untrusted: records that
//! fail validation or authentication are reported and dropped, never shown.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod boundary;
pub mod config;
pub mod env;
pub mod error;
pub mod feed;
pub mod identity_store;
pub mod protocol;
pub mod record;
pub mod wire;

pub use boundary::{MessageStore, PublicKeyPublisher, PublicKeyResolver, SecureKeyStore, Subscription};
pub use config::ProtocolConfig;
pub use env::Environment;
pub use error::{ProtocolError, StoreError};
pub use feed::MessageFeed;
pub use identity_store::IdentityKeyStore;
pub use protocol::{ConversationProtocol, History};
pub use record::{
    ConversationId, ConversationRecord, DecryptedMessage, FieldValue, MessageId, MessageRecord,
    NewConversation, ParticipantId, RawRecord, RecordError, ThreadKeyBlobs, fields,
};
