//! Contracts for the external collaborators the protocol drives.
//!
//! Every method is async and fallible. Implementations must apply each call
//! atomically: a failed call leaves no partial record visible to readers.
//! The protocol never holds an in-memory lock across these calls.

use async_trait::async_trait;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

use crate::{
    error::StoreError,
    record::{ConversationId, ConversationRecord, MessageRecord, NewConversation, ParticipantId, RawRecord},
};

/// Secure, process-independent storage for local secret material.
#[async_trait]
pub trait SecureKeyStore: Send + Sync {
    /// Bytes stored under `label`. `None` if nothing was stored.
    async fn get(&self, label: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError>;

    /// Store bytes under `label`, replacing any previous value.
    async fn put(&self, label: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Lookup of participants' published identity public keys.
#[async_trait]
pub trait PublicKeyResolver: Send + Sync {
    /// Published public key of `participant`.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no key has been published
    async fn fetch_public_key(&self, participant: &ParticipantId) -> Result<Vec<u8>, StoreError>;
}

/// Publishing side of the public key directory.
#[async_trait]
pub trait PublicKeyPublisher: Send + Sync {
    /// Publish (or replace) the public key of `participant`.
    async fn publish_public_key(
        &self,
        participant: &ParticipantId,
        public_key: &[u8],
    ) -> Result<(), StoreError>;
}

/// Durable store of conversation and message records.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably create and share a conversation. Returns the stored record
    /// with its assigned identifier.
    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<ConversationRecord, StoreError>;

    /// Durably append a message to a conversation.
    async fn append_message(
        &self,
        message: &MessageRecord,
        conversation: &ConversationRecord,
    ) -> Result<(), StoreError>;

    /// All conversations visible to the local identity.
    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>, StoreError>;

    /// All raw message records of a conversation. Order is not guaranteed.
    async fn fetch_messages(
        &self,
        conversation: &ConversationRecord,
    ) -> Result<Vec<RawRecord>, StoreError>;

    /// Register for notification of messages appended after this call.
    async fn subscribe(&self, conversation: &ConversationRecord) -> Result<Subscription, StoreError>;
}

/// Live stream of raw message records appended to one conversation.
///
/// Ends when the store drops its sending side.
#[derive(Debug)]
pub struct Subscription {
    conversation_id: ConversationId,
    receiver: mpsc::UnboundedReceiver<RawRecord>,
}

impl Subscription {
    /// Wrap the receiving half of a store-owned channel.
    pub fn new(conversation_id: ConversationId, receiver: mpsc::UnboundedReceiver<RawRecord>) -> Self {
        Self { conversation_id, receiver }
    }

    /// Conversation this subscription follows.
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Next appended record. `None` once the store closes the stream.
    pub async fn recv(&mut self) -> Option<RawRecord> {
        self.receiver.recv().await
    }
}
