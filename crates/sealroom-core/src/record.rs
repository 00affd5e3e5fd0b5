//! Conversation and message records.
//!
//! Records cross the store boundary as [`RawRecord`]s: a record id plus a map
//! of named fields. Typed records are built from raw ones through validating
//! constructors that report missing or mistyped fields instead of assuming
//! their presence.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{env::Environment, wire};

/// Field names used in raw records.
pub mod fields {
    /// Message ciphertext bytes
    pub const CIPHERTEXT: &str = "ciphertext";
    /// Message nonce bytes
    pub const NONCE: &str = "nonce";
    /// Message authentication tag bytes
    pub const TAG: &str = "tag";
    /// Sender participant identifier
    pub const SENDER_ID: &str = "senderID";
    /// Message timestamp (milliseconds since the Unix epoch)
    pub const TIMESTAMP: &str = "timestamp";
    /// Optional message signature bytes
    pub const SIGNATURE: &str = "signature";
    /// Parent conversation identifier of a message
    pub const PARENT: &str = "parent";
    /// Initiator public key of a conversation
    pub const INITIATOR_PUBLIC_KEY: &str = "initiatorPublicKey";
    /// Base64-in-JSON participant to wrapped-key map
    pub const THREAD_KEY_BLOBS: &str = "threadKeyBlobs";
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Routable identifier of a conversation participant.
    ParticipantId
);

string_id!(
    /// Store-assigned identifier of a conversation.
    ConversationId
);

string_id!(
    /// Identifier of a single message record.
    MessageId
);

impl ConversationId {
    /// Fresh random identifier.
    pub fn generate<E: Environment>(env: &E) -> Self {
        Self(format!("{:032x}", env.random_u128()))
    }
}

impl MessageId {
    /// Fresh random identifier.
    pub fn generate<E: Environment>(env: &E) -> Self {
        Self(format!("{:032x}", env.random_u128()))
    }
}

/// Participant to wrapped thread-key blob mapping. Keys are unique; order
/// carries no meaning.
pub type ThreadKeyBlobs = BTreeMap<ParticipantId, Vec<u8>>;

/// Validation failures for raw records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Required field is absent
    #[error("missing field `{field}`")]
    MissingField {
        /// Field name
        field: String,
    },

    /// Field is present with a different value kind
    #[error("field `{field}` has wrong type, expected {expected}")]
    WrongFieldType {
        /// Field name
        field: String,
        /// Expected value kind
        expected: &'static str,
    },

    /// Field has the right kind but an unusable value
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField {
        /// Field name
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// A single field value in a raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Opaque bytes
    Bytes(Vec<u8>),
    /// UTF-8 text
    Text(String),
    /// Milliseconds since the Unix epoch
    Timestamp(u64),
}

/// Untyped record as exchanged with a record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Record identifier
    pub id: String,
    fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    /// Empty record with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), fields: BTreeMap::new() }
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a field.
    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// Field value by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Mutable field value by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(name)
    }

    /// Required bytes field.
    pub fn bytes(&self, name: &str) -> Result<&[u8], RecordError> {
        match self.required(name)? {
            FieldValue::Bytes(bytes) => Ok(bytes),
            _ => Err(wrong_type(name, "bytes")),
        }
    }

    /// Optional bytes field. Present-but-mistyped is still an error.
    pub fn optional_bytes(&self, name: &str) -> Result<Option<&[u8]>, RecordError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(FieldValue::Bytes(bytes)) => Ok(Some(bytes)),
            Some(_) => Err(wrong_type(name, "bytes")),
        }
    }

    /// Required text field.
    pub fn text(&self, name: &str) -> Result<&str, RecordError> {
        match self.required(name)? {
            FieldValue::Text(text) => Ok(text),
            _ => Err(wrong_type(name, "text")),
        }
    }

    /// Required timestamp field.
    pub fn timestamp(&self, name: &str) -> Result<u64, RecordError> {
        match self.required(name)? {
            FieldValue::Timestamp(millis) => Ok(*millis),
            _ => Err(wrong_type(name, "timestamp")),
        }
    }

    fn required(&self, name: &str) -> Result<&FieldValue, RecordError> {
        self.fields.get(name).ok_or_else(|| RecordError::MissingField { field: name.to_string() })
    }
}

fn wrong_type(name: &str, expected: &'static str) -> RecordError {
    RecordError::WrongFieldType { field: name.to_string(), expected }
}

/// Conversation draft handed to the store for durable creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    /// Full participant set, initiator included
    pub participants: Vec<ParticipantId>,
    /// Initiator's identity public key
    pub initiator_public_key: Vec<u8>,
    /// One wrapped thread key per participant
    pub encrypted_thread_keys: ThreadKeyBlobs,
}

impl NewConversation {
    /// Attach the store-assigned identifier.
    pub fn into_record(self, id: ConversationId) -> ConversationRecord {
        ConversationRecord {
            id,
            initiator_public_key: self.initiator_public_key,
            encrypted_thread_keys: self.encrypted_thread_keys,
        }
    }
}

/// A conversation as persisted by the store.
///
/// # Invariants
///
/// - Every current participant has exactly one blob
/// - The initiator's own identifier is always present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    /// Store-assigned identifier
    pub id: ConversationId,
    /// Initiator public key, needed by every participant to rederive its
    /// wrapping key
    pub initiator_public_key: Vec<u8>,
    /// Participant to wrapped thread-key mapping
    pub encrypted_thread_keys: ThreadKeyBlobs,
}

impl ConversationRecord {
    /// Participants holding a thread-key blob.
    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.encrypted_thread_keys.keys()
    }

    /// Check whether a participant holds a blob.
    pub fn has_participant(&self, participant: &ParticipantId) -> bool {
        self.encrypted_thread_keys.contains_key(participant)
    }

    /// Encode for storage, with the blob map as base64-in-JSON.
    pub fn to_raw(&self) -> Result<RawRecord, RecordError> {
        let blobs = wire::encode_thread_key_blobs(&self.encrypted_thread_keys)?;
        Ok(RawRecord::new(self.id.as_str())
            .with(fields::INITIATOR_PUBLIC_KEY, FieldValue::Bytes(self.initiator_public_key.clone()))
            .with(fields::THREAD_KEY_BLOBS, FieldValue::Bytes(blobs)))
    }

    /// Decode a stored conversation.
    pub fn from_raw(raw: &RawRecord) -> Result<Self, RecordError> {
        let initiator_public_key = raw.bytes(fields::INITIATOR_PUBLIC_KEY)?.to_vec();
        let encrypted_thread_keys =
            wire::decode_thread_key_blobs(raw.bytes(fields::THREAD_KEY_BLOBS)?)?;

        Ok(Self { id: ConversationId::new(raw.id.clone()), initiator_public_key, encrypted_thread_keys })
    }
}

/// One sealed message as persisted by the store.
///
/// # Invariants
///
/// - Sealed under the conversation's thread key with a nonce never used
///   before under that key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Record identifier
    pub id: MessageId,
    /// Parent conversation
    pub conversation_id: ConversationId,
    /// Sending participant
    pub sender: ParticipantId,
    /// Send time, milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// AEAD ciphertext
    pub ciphertext: Vec<u8>,
    /// AEAD nonce
    pub nonce: Vec<u8>,
    /// AEAD authentication tag
    pub tag: Vec<u8>,
    /// Reserved; not produced or checked by the protocol
    pub signature: Option<Vec<u8>>,
}

impl MessageRecord {
    /// Encode for storage. Ciphertext, nonce and tag stay independent fields.
    pub fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::new(self.id.as_str())
            .with(fields::PARENT, FieldValue::Text(self.conversation_id.to_string()))
            .with(fields::SENDER_ID, FieldValue::Text(self.sender.to_string()))
            .with(fields::TIMESTAMP, FieldValue::Timestamp(self.timestamp_ms))
            .with(fields::CIPHERTEXT, FieldValue::Bytes(self.ciphertext.clone()))
            .with(fields::NONCE, FieldValue::Bytes(self.nonce.clone()))
            .with(fields::TAG, FieldValue::Bytes(self.tag.clone()));

        if let Some(signature) = &self.signature {
            raw.set(fields::SIGNATURE, FieldValue::Bytes(signature.clone()));
        }
        raw
    }

    /// Decode and validate an inbound message record.
    pub fn from_raw(raw: &RawRecord) -> Result<Self, RecordError> {
        Ok(Self {
            id: MessageId::new(raw.id.clone()),
            conversation_id: ConversationId::new(raw.text(fields::PARENT)?),
            sender: ParticipantId::new(raw.text(fields::SENDER_ID)?),
            timestamp_ms: raw.timestamp(fields::TIMESTAMP)?,
            ciphertext: raw.bytes(fields::CIPHERTEXT)?.to_vec(),
            nonce: raw.bytes(fields::NONCE)?.to_vec(),
            tag: raw.bytes(fields::TAG)?.to_vec(),
            signature: raw.optional_bytes(fields::SIGNATURE)?.map(<[u8]>::to_vec),
        })
    }
}

/// A message after successful decryption. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    /// Record identifier of the sealed message
    pub id: MessageId,
    /// Sending participant
    pub sender: ParticipantId,
    /// Recovered plaintext
    pub text: String,
    /// Send time, milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}
