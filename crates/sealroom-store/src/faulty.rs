//! Fault-injecting wrappers for abort-semantics testing.
//!
//! Delegate to an inner collaborator but fail chosen operations on demand.
//! Failures are deterministic: an operation fails exactly while it is armed.

#![allow(clippy::disallowed_types, reason = "Locking simple fault plans")]

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use sealroom_core::{
    ConversationRecord, MessageRecord, MessageStore, NewConversation, ParticipantId,
    PublicKeyPublisher, PublicKeyResolver, RawRecord, StoreError, Subscription,
};

/// Message store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `create_conversation`
    CreateConversation,
    /// `append_message`
    AppendMessage,
    /// `fetch_conversations` and `fetch_messages`
    Fetch,
    /// `subscribe`
    Subscribe,
}

/// Message store wrapper that fails armed operations with
/// `StoreError::Unavailable` before reaching the inner store.
#[derive(Clone)]
pub struct FaultyMessageStore<S> {
    inner: S,
    armed: Arc<Mutex<HashSet<StoreOp>>>,
    operation_count: Arc<AtomicUsize>,
}

impl<S: MessageStore> FaultyMessageStore<S> {
    /// Wrap `inner` with nothing armed.
    pub fn new(inner: S) -> Self {
        Self { inner, armed: Arc::default(), operation_count: Arc::default() }
    }

    /// Underlying store (for checking what was actually written).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Make every later call of `op` fail.
    pub fn fail(&self, op: StoreOp) {
        self.lock().insert(op);
    }

    /// Let `op` reach the inner store again.
    pub fn heal(&self, op: StoreOp) {
        self.lock().remove(&op);
    }

    /// Total number of calls attempted, failed ones included.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::SeqCst)
    }

    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        self.operation_count.fetch_add(1, Ordering::SeqCst);
        if self.lock().contains(&op) {
            return Err(StoreError::Unavailable(format!("injected failure in {op:?}")));
        }
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, HashSet<StoreOp>> {
        self.armed.lock().expect("fault plan mutex poisoned")
    }
}

#[async_trait]
impl<S: MessageStore> MessageStore for FaultyMessageStore<S> {
    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<ConversationRecord, StoreError> {
        self.check(StoreOp::CreateConversation)?;
        self.inner.create_conversation(conversation).await
    }

    async fn append_message(
        &self,
        message: &MessageRecord,
        conversation: &ConversationRecord,
    ) -> Result<(), StoreError> {
        self.check(StoreOp::AppendMessage)?;
        self.inner.append_message(message, conversation).await
    }

    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        self.check(StoreOp::Fetch)?;
        self.inner.fetch_conversations().await
    }

    async fn fetch_messages(
        &self,
        conversation: &ConversationRecord,
    ) -> Result<Vec<RawRecord>, StoreError> {
        self.check(StoreOp::Fetch)?;
        self.inner.fetch_messages(conversation).await
    }

    async fn subscribe(&self, conversation: &ConversationRecord) -> Result<Subscription, StoreError> {
        self.check(StoreOp::Subscribe)?;
        self.inner.subscribe(conversation).await
    }
}

/// Key directory wrapper that fails lookups of chosen participants.
#[derive(Clone)]
pub struct FaultyKeyDirectory<D> {
    inner: D,
    failing: Arc<Mutex<HashSet<ParticipantId>>>,
    lookups: Arc<AtomicUsize>,
}

impl<D: PublicKeyResolver> FaultyKeyDirectory<D> {
    /// Wrap `inner` with no failing participants.
    pub fn new(inner: D) -> Self {
        Self { inner, failing: Arc::default(), lookups: Arc::default() }
    }

    /// Underlying directory.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Make lookups of `participant` fail with `StoreError::Unavailable`.
    pub fn fail_participant(&self, participant: ParticipantId) {
        self.lock().insert(participant);
    }

    /// Number of lookups attempted, failed ones included.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, HashSet<ParticipantId>> {
        self.failing.lock().expect("fault plan mutex poisoned")
    }
}

#[async_trait]
impl<D: PublicKeyResolver> PublicKeyResolver for FaultyKeyDirectory<D> {
    async fn fetch_public_key(&self, participant: &ParticipantId) -> Result<Vec<u8>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.lock().contains(participant) {
            return Err(StoreError::Unavailable(format!("injected failure for {participant}")));
        }
        self.inner.fetch_public_key(participant).await
    }
}

#[async_trait]
impl<D: PublicKeyResolver + PublicKeyPublisher> PublicKeyPublisher for FaultyKeyDirectory<D> {
    async fn publish_public_key(
        &self,
        participant: &ParticipantId,
        public_key: &[u8],
    ) -> Result<(), StoreError> {
        self.inner.publish_public_key(participant, public_key).await
    }
}
