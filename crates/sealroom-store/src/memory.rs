//! In-memory collaborators for tests, simulation and the demo binary.
//!
//! All state lives behind `Arc<Mutex<..>>`, so clones share one store. Each
//! trait call takes the lock once and releases it before returning, which
//! makes every call atomic with respect to every other.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use sealroom_core::{
    ConversationId, ConversationRecord, Environment, MessageRecord, MessageStore, NewConversation,
    ParticipantId, PublicKeyPublisher, PublicKeyResolver, RawRecord, SecureKeyStore, StoreError,
    Subscription,
};
use tokio::sync::mpsc;
use tracing::{trace, warn};
use zeroize::Zeroizing;

/// Shared in-memory record store.
///
/// Conversations and messages are kept in their raw, persisted form; the
/// thread-key blob map is stored as base64-in-JSON exactly as a remote
/// store would hold it.
#[derive(Clone)]
pub struct MemoryMessageStore<E> {
    env: E,
    inner: Arc<Mutex<MessageStoreInner>>,
}

#[derive(Default)]
struct MessageStoreInner {
    /// Conversation rows in creation order
    conversations: Vec<RawRecord>,

    /// Message rows per conversation, in append order
    messages: HashMap<ConversationId, Vec<RawRecord>>,

    /// Live subscribers per conversation
    subscribers: HashMap<ConversationId, Vec<mpsc::UnboundedSender<RawRecord>>>,
}

impl MessageStoreInner {
    fn has_conversation(&self, id: &ConversationId) -> bool {
        self.conversations.iter().any(|raw| raw.id == id.as_str())
    }

    /// Persist a message row and hand it to every live subscriber, pruning
    /// subscribers whose receiver is gone.
    fn append(&mut self, conversation_id: &ConversationId, raw: RawRecord) {
        if let Some(senders) = self.subscribers.get_mut(conversation_id) {
            senders.retain(|sender| sender.send(raw.clone()).is_ok());
        }
        self.messages.entry(conversation_id.clone()).or_default().push(raw);
    }
}

impl<E: Environment> MemoryMessageStore<E> {
    /// Empty store assigning identifiers from `env`.
    pub fn new(env: E) -> Self {
        Self { env, inner: Arc::new(Mutex::new(MessageStoreInner::default())) }
    }

    /// Number of stored conversation rows.
    pub fn conversation_count(&self) -> usize {
        self.lock().conversations.len()
    }

    /// Number of stored message rows in a conversation.
    pub fn message_count(&self, conversation_id: &ConversationId) -> usize {
        self.lock().messages.get(conversation_id).map_or(0, Vec::len)
    }

    /// Store an arbitrary message row and deliver it to subscribers, as a
    /// misbehaving peer or a compromised store would.
    pub fn inject_message(&self, conversation_id: &ConversationId, raw: RawRecord) {
        self.lock().append(conversation_id, raw);
    }

    /// Store an arbitrary conversation row.
    pub fn inject_conversation(&self, raw: RawRecord) {
        self.lock().conversations.push(raw);
    }

    /// Rewrite stored message rows in place.
    pub fn tamper_messages(&self, conversation_id: &ConversationId, mut f: impl FnMut(usize, &mut RawRecord)) {
        let mut inner = self.lock();
        if let Some(rows) = inner.messages.get_mut(conversation_id) {
            for (index, raw) in rows.iter_mut().enumerate() {
                f(index, raw);
            }
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test and
    /// simulation code.
    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, MessageStoreInner> {
        self.inner.lock().expect("Mutex poisoned")
    }
}

#[async_trait]
impl<E: Environment> MessageStore for MemoryMessageStore<E> {
    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<ConversationRecord, StoreError> {
        let record = conversation.into_record(ConversationId::generate(&self.env));
        let raw = record.to_raw().map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.lock().conversations.push(raw);
        trace!(conversation = %record.id, "stored conversation");
        Ok(record)
    }

    async fn append_message(
        &self,
        message: &MessageRecord,
        conversation: &ConversationRecord,
    ) -> Result<(), StoreError> {
        let raw = message.to_raw();

        let mut inner = self.lock();
        if !inner.has_conversation(&conversation.id) {
            return Err(StoreError::NotFound(format!("conversation {}", conversation.id)));
        }
        inner.append(&conversation.id, raw);
        Ok(())
    }

    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        let rows = self.lock().conversations.clone();

        let conversations = rows
            .iter()
            .filter_map(|raw| match ConversationRecord::from_raw(raw) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(conversation = %raw.id, error = %err, "skipping malformed conversation");
                    None
                },
            })
            .collect();
        Ok(conversations)
    }

    async fn fetch_messages(
        &self,
        conversation: &ConversationRecord,
    ) -> Result<Vec<RawRecord>, StoreError> {
        Ok(self.lock().messages.get(&conversation.id).cloned().unwrap_or_default())
    }

    async fn subscribe(&self, conversation: &ConversationRecord) -> Result<Subscription, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut inner = self.lock();
        if !inner.has_conversation(&conversation.id) {
            return Err(StoreError::NotFound(format!("conversation {}", conversation.id)));
        }
        inner.subscribers.entry(conversation.id.clone()).or_default().push(sender);

        Ok(Subscription::new(conversation.id.clone(), receiver))
    }
}

/// Shared in-memory public key directory.
#[derive(Clone, Default)]
pub struct MemoryKeyDirectory {
    keys: Arc<Mutex<HashMap<ParticipantId, Vec<u8>>>>,
}

impl MemoryKeyDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Withdraw a participant's published key.
    pub fn remove(&self, participant: &ParticipantId) -> Option<Vec<u8>> {
        self.lock().remove(participant)
    }

    /// Number of published keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check whether no key has been published.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, HashMap<ParticipantId, Vec<u8>>> {
        self.keys.lock().expect("Mutex poisoned")
    }
}

#[async_trait]
impl PublicKeyResolver for MemoryKeyDirectory {
    async fn fetch_public_key(&self, participant: &ParticipantId) -> Result<Vec<u8>, StoreError> {
        self.lock()
            .get(participant)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("public key for {participant}")))
    }
}

#[async_trait]
impl PublicKeyPublisher for MemoryKeyDirectory {
    async fn publish_public_key(
        &self,
        participant: &ParticipantId,
        public_key: &[u8],
    ) -> Result<(), StoreError> {
        self.lock().insert(participant.clone(), public_key.to_vec());
        Ok(())
    }
}

/// In-memory secure key store. Values are zeroized when replaced or when
/// the last clone is dropped.
#[derive(Clone, Default)]
pub struct MemorySecureStore {
    entries: Arc<Mutex<HashMap<String, Zeroizing<Vec<u8>>>>>,
}

impl MemorySecureStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Zeroizing<Vec<u8>>>> {
        self.entries.lock().expect("Mutex poisoned")
    }
}

#[async_trait]
impl SecureKeyStore for MemorySecureStore {
    async fn get(&self, label: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        Ok(self.lock().get(label).cloned())
    }

    async fn put(&self, label: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.lock().insert(label.to_string(), Zeroizing::new(bytes.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sealroom_core::{FieldValue, MessageId, ThreadKeyBlobs, fields};

    use super::*;
    use crate::SystemEnv;

    fn draft(participants: &[&str]) -> NewConversation {
        let mut blobs = ThreadKeyBlobs::new();
        for participant in participants {
            blobs.insert(ParticipantId::new(*participant), vec![7; 72]);
        }
        NewConversation {
            participants: participants.iter().map(|p| ParticipantId::new(*p)).collect(),
            initiator_public_key: vec![9; 32],
            encrypted_thread_keys: blobs,
        }
    }

    fn message(conversation: &ConversationRecord, n: u8) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(format!("m{n}")),
            conversation_id: conversation.id.clone(),
            sender: ParticipantId::new("alice"),
            timestamp_ms: u64::from(n),
            ciphertext: vec![n],
            nonce: vec![0; 24],
            tag: vec![0; 16],
            signature: None,
        }
    }

    #[tokio::test]
    async fn created_conversation_is_listed() {
        let store = MemoryMessageStore::new(SystemEnv::new());

        let created = store.create_conversation(draft(&["alice", "bob"])).await.unwrap();
        let listed = store.fetch_conversations().await.unwrap();

        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn conversations_get_distinct_ids() {
        let store = MemoryMessageStore::new(SystemEnv::new());

        let a = store.create_conversation(draft(&["alice"])).await.unwrap();
        let b = store.create_conversation(draft(&["alice"])).await.unwrap();

        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn malformed_conversation_rows_are_skipped() {
        let store = MemoryMessageStore::new(SystemEnv::new());
        let good = store.create_conversation(draft(&["alice"])).await.unwrap();
        store.inject_conversation(
            RawRecord::new("broken")
                .with(fields::INITIATOR_PUBLIC_KEY, FieldValue::Bytes(vec![1; 32]))
                .with(fields::THREAD_KEY_BLOBS, FieldValue::Bytes(b"not json".to_vec())),
        );

        let listed = store.fetch_conversations().await.unwrap();

        assert_eq!(listed, vec![good]);
        assert_eq!(store.conversation_count(), 2);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let store = MemoryMessageStore::new(SystemEnv::new());
        let phantom = draft(&["alice"]).into_record(ConversationId::new("phantom"));

        let result = store.append_message(&message(&phantom, 1), &phantom).await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(store.message_count(&phantom.id), 0);
    }

    #[tokio::test]
    async fn appended_messages_are_fetched_and_broadcast() {
        let store = MemoryMessageStore::new(SystemEnv::new());
        let conversation = store.create_conversation(draft(&["alice"])).await.unwrap();
        let mut subscription = store.subscribe(&conversation).await.unwrap();

        store.append_message(&message(&conversation, 1), &conversation).await.unwrap();
        store.append_message(&message(&conversation, 2), &conversation).await.unwrap();

        let fetched = store.fetch_messages(&conversation).await.unwrap();
        assert_eq!(fetched.len(), 2);

        assert_eq!(subscription.conversation_id(), &conversation.id);
        assert_eq!(subscription.recv().await.unwrap().id, "m1");
        assert_eq!(subscription.recv().await.unwrap().id, "m2");
    }

    #[tokio::test]
    async fn subscription_only_sees_later_messages() {
        let store = MemoryMessageStore::new(SystemEnv::new());
        let conversation = store.create_conversation(draft(&["alice"])).await.unwrap();
        store.append_message(&message(&conversation, 1), &conversation).await.unwrap();

        let mut subscription = store.subscribe(&conversation).await.unwrap();
        store.append_message(&message(&conversation, 2), &conversation).await.unwrap();

        assert_eq!(subscription.recv().await.unwrap().id, "m2");
    }

    #[tokio::test]
    async fn directory_reports_unknown_participant() {
        let directory = MemoryKeyDirectory::new();
        let bob = ParticipantId::new("bob");

        assert!(matches!(directory.fetch_public_key(&bob).await, Err(StoreError::NotFound(_))));

        directory.publish_public_key(&bob, &[4; 32]).await.unwrap();
        assert_eq!(directory.fetch_public_key(&bob).await.unwrap(), vec![4; 32]);

        directory.remove(&bob);
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn secure_store_clones_share_entries() {
        let store = MemorySecureStore::new();
        let clone = store.clone();

        store.put("label", &[1, 2, 3]).await.unwrap();

        assert_eq!(clone.get("label").await.unwrap().as_deref(), Some(&vec![1, 2, 3]));
        assert!(clone.get("other").await.unwrap().is_none());
    }
}
