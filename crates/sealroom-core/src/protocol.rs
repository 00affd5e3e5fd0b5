//! Conversation protocol.
//!
//! Orchestrates thread-key generation, per-participant wrapping, and message
//! send/receive. Cryptographic work is pure and done before any store call,
//! so a cancelled or failed operation never leaves a partial record behind:
//! the store call is the only durable step.

use std::{collections::BTreeSet, sync::Arc};

use sealroom_crypto::{
    IdentityKeyPair, IdentityPublicKey, ThreadKey, derive_wrapping_key, open_message,
    seal_message, unwrap_thread_key, wrap_thread_key,
};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::{
    boundary::{MessageStore, PublicKeyPublisher, PublicKeyResolver, SecureKeyStore},
    config::ProtocolConfig,
    env::Environment,
    error::ProtocolError,
    feed::MessageFeed,
    identity_store::IdentityKeyStore,
    record::{
        ConversationRecord, DecryptedMessage, MessageId, MessageRecord, NewConversation,
        ParticipantId, RawRecord, RecordError, ThreadKeyBlobs, fields,
    },
};

/// Decrypted conversation history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    /// Successfully decrypted messages, oldest first
    pub messages: Vec<DecryptedMessage>,
    /// Records that failed validation or authentication and were skipped
    pub dropped: usize,
}

/// End-to-end encrypted conversations for one local identity.
///
/// Generic over the environment (`E`), secure key store (`K`), public key
/// resolver (`R`) and message store (`M`).
pub struct ConversationProtocol<E, K, R, M> {
    env: E,
    local: ParticipantId,
    identity: IdentityKeyStore<K, E>,
    resolver: R,
    store: M,
    config: ProtocolConfig,
}

impl<E, K, R, M> ConversationProtocol<E, K, R, M>
where
    E: Environment,
    K: SecureKeyStore,
    R: PublicKeyResolver,
    M: MessageStore,
{
    /// Protocol instance acting as `local`.
    ///
    /// The identity key is read from `key_store` under
    /// [`ProtocolConfig::identity_label`] on first use.
    pub fn new(
        env: E,
        local: ParticipantId,
        key_store: K,
        resolver: R,
        store: M,
        config: ProtocolConfig,
    ) -> Self {
        let identity = IdentityKeyStore::new(env.clone(), key_store, config.identity_label(&local));
        Self { env, local, identity, resolver, store, config }
    }

    /// Identifier of the local participant.
    pub fn local_participant(&self) -> &ParticipantId {
        &self.local
    }

    /// Active configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Identity key store backing this protocol.
    pub fn identity(&self) -> &IdentityKeyStore<K, E> {
        &self.identity
    }

    /// Public key resolver backing this protocol.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Message store backing this protocol.
    pub fn store(&self) -> &M {
        &self.store
    }

    /// Public half of the local identity key.
    pub async fn local_public_key(&self) -> Result<IdentityPublicKey, ProtocolError> {
        Ok(self.identity.identity_key_pair().await?.public_key())
    }

    /// Create a conversation with `participants` plus the local identity.
    ///
    /// Generates a fresh thread key and wraps it for every participant, one
    /// at a time. The first participant that cannot be resolved or wrapped
    /// for aborts the whole operation before anything is written.
    ///
    /// # Errors
    ///
    /// - `TooManyParticipants` if the set exceeds the configured limit
    /// - `ParticipantKeyResolutionFailed` for the first unusable participant
    /// - `StoreOperationFailed` if the store rejects the conversation
    pub async fn start_conversation(
        &self,
        participants: &[ParticipantId],
    ) -> Result<ConversationRecord, ProtocolError> {
        let mut members: BTreeSet<ParticipantId> = participants.iter().cloned().collect();
        members.insert(self.local.clone());

        if members.len() > self.config.max_participants {
            return Err(ProtocolError::TooManyParticipants {
                count: members.len(),
                max: self.config.max_participants,
            });
        }

        let identity = self.identity.identity_key_pair().await?;
        let thread_key = self.generate_thread_key();

        let mut blobs = ThreadKeyBlobs::new();
        for participant in &members {
            let blob = self.wrap_for(participant, &identity, &thread_key).await?;
            blobs.insert(participant.clone(), blob);
        }
        drop(thread_key);

        let draft = NewConversation {
            participants: members.into_iter().collect(),
            initiator_public_key: identity.public_key().to_vec(),
            encrypted_thread_keys: blobs,
        };

        let record =
            self.store.create_conversation(draft).await.map_err(ProtocolError::StoreOperationFailed)?;

        debug!(
            conversation = %record.id,
            participants = record.encrypted_thread_keys.len(),
            "conversation created"
        );
        Ok(record)
    }

    /// Seal `plaintext` under the conversation's thread key and append it.
    ///
    /// Returns the record handed to the store.
    ///
    /// # Errors
    ///
    /// - `PlaintextTooLarge` if the plaintext exceeds the configured limit
    /// - `NoThreadKeyForParticipant` if the conversation has no blob for the
    ///   local identity; nothing is written
    /// - `AuthenticationFailed` if the local blob does not open
    /// - `StoreOperationFailed` if the append fails
    pub async fn send_message(
        &self,
        plaintext: &str,
        conversation: &ConversationRecord,
    ) -> Result<MessageRecord, ProtocolError> {
        if plaintext.len() > self.config.max_plaintext_len {
            return Err(ProtocolError::PlaintextTooLarge {
                len: plaintext.len(),
                max: self.config.max_plaintext_len,
            });
        }

        let thread_key = self.recover_thread_key(conversation).await?;
        let sealed = seal_message(plaintext.as_bytes(), &thread_key, self.env.random_array());
        drop(thread_key);

        let message = MessageRecord {
            id: MessageId::generate(&self.env),
            conversation_id: conversation.id.clone(),
            sender: self.local.clone(),
            timestamp_ms: self.env.wall_clock_millis(),
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce.to_vec(),
            tag: sealed.tag.to_vec(),
            signature: None,
        };

        self.store
            .append_message(&message, conversation)
            .await
            .map_err(ProtocolError::StoreOperationFailed)?;

        debug!(conversation = %conversation.id, message = %message.id, "message appended");
        Ok(message)
    }

    /// Validate and decrypt one inbound message record.
    ///
    /// Errors are returned, not swallowed; pipelines that must keep going
    /// after a bad record use [`history`](Self::history) or
    /// [`feed`](Self::feed).
    pub async fn receive_message(
        &self,
        raw: &RawRecord,
        conversation: &ConversationRecord,
    ) -> Result<DecryptedMessage, ProtocolError> {
        let message = parse_inbound(raw, conversation)?;
        let thread_key = self.recover_thread_key(conversation).await?;
        open_record(&message, &thread_key)
    }

    /// Fetch and decrypt every stored message of a conversation.
    ///
    /// The thread key is recovered once, before anything is fetched, so a
    /// caller without a blob gets an error even for an empty conversation.
    /// Records that fail validation or authentication are logged and
    /// counted, never returned as plaintext, and never stop the remaining
    /// records from being processed.
    pub async fn history(&self, conversation: &ConversationRecord) -> Result<History, ProtocolError> {
        let thread_key = self.recover_thread_key(conversation).await?;

        let raws = self
            .store
            .fetch_messages(conversation)
            .await
            .map_err(ProtocolError::StoreOperationFailed)?;

        let mut history = History::default();
        for raw in &raws {
            let opened = parse_inbound(raw, conversation)
                .and_then(|message| open_record(&message, &thread_key));

            match opened {
                Ok(message) => history.messages.push(message),
                Err(err) => {
                    history.dropped += 1;
                    warn!(
                        conversation = %conversation.id,
                        record = %raw.id,
                        error = %err,
                        "dropping undecryptable message"
                    );
                },
            }
        }

        history.messages.sort_by_key(|message| message.timestamp_ms);
        Ok(history)
    }

    /// Subscribe to messages appended to a conversation from now on.
    ///
    /// Checks up front that the local identity can recover the thread key,
    /// so a feed is never handed out for a conversation it cannot read.
    pub async fn feed(
        &self,
        conversation: &ConversationRecord,
    ) -> Result<MessageFeed<'_, E, K, R, M>, ProtocolError> {
        drop(self.recover_thread_key(conversation).await?);

        let subscription =
            self.store.subscribe(conversation).await.map_err(ProtocolError::StoreOperationFailed)?;

        Ok(MessageFeed::new(self, conversation.clone(), subscription))
    }

    /// Conversations visible to the local identity: those holding a blob
    /// for it. Rows shared with other participants only are filtered out.
    pub async fn conversations(&self) -> Result<Vec<ConversationRecord>, ProtocolError> {
        let all =
            self.store.fetch_conversations().await.map_err(ProtocolError::StoreOperationFailed)?;

        Ok(all.into_iter().filter(|record| record.has_participant(&self.local)).collect())
    }

    fn generate_thread_key(&self) -> ThreadKey {
        let mut bytes = Zeroizing::new([0u8; 32]);
        self.env.random_bytes(bytes.as_mut_slice());
        ThreadKey::from_bytes(*bytes)
    }

    /// Produce one participant's blob. The local identity's own key is used
    /// directly rather than looked up, so the initiator blob always matches
    /// the `initiator_public_key` recorded in the conversation.
    async fn wrap_for(
        &self,
        participant: &ParticipantId,
        identity: &IdentityKeyPair,
        thread_key: &ThreadKey,
    ) -> Result<Vec<u8>, ProtocolError> {
        let public_key = if *participant == self.local {
            identity.public_key()
        } else {
            self.resolve_public_key(participant).await?
        };

        let wrapping_key = derive_wrapping_key(identity, &public_key).map_err(|e| {
            ProtocolError::ParticipantKeyResolutionFailed {
                participant: participant.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(wrap_thread_key(thread_key, &wrapping_key, self.env.random_array()))
    }

    async fn resolve_public_key(
        &self,
        participant: &ParticipantId,
    ) -> Result<IdentityPublicKey, ProtocolError> {
        let resolution_failed = |reason: String| ProtocolError::ParticipantKeyResolutionFailed {
            participant: participant.clone(),
            reason,
        };

        let bytes = self
            .resolver
            .fetch_public_key(participant)
            .await
            .map_err(|e| resolution_failed(e.to_string()))?;

        IdentityPublicKey::from_slice(&bytes).map_err(|e| resolution_failed(e.to_string()))
    }

    /// Unwrap the local participant's blob using the initiator's public key.
    pub(crate) async fn recover_thread_key(
        &self,
        conversation: &ConversationRecord,
    ) -> Result<ThreadKey, ProtocolError> {
        let blob = conversation.encrypted_thread_keys.get(&self.local).ok_or_else(|| {
            ProtocolError::NoThreadKeyForParticipant { participant: self.local.clone() }
        })?;

        let initiator = IdentityPublicKey::from_slice(&conversation.initiator_public_key)
            .map_err(|e| invalid_initiator_key(&e))?;

        let identity: Arc<IdentityKeyPair> = self.identity.identity_key_pair().await?;
        let wrapping_key =
            derive_wrapping_key(&identity, &initiator).map_err(|e| invalid_initiator_key(&e))?;

        Ok(unwrap_thread_key(blob, &wrapping_key)?)
    }
}

impl<E, K, R, M> ConversationProtocol<E, K, R, M>
where
    E: Environment,
    K: SecureKeyStore,
    R: PublicKeyResolver + PublicKeyPublisher,
    M: MessageStore,
{
    /// Publish the local identity public key so others can add us to
    /// conversations. Generates the identity on first use.
    pub async fn publish_public_key(&self) -> Result<IdentityPublicKey, ProtocolError> {
        let public_key = self.local_public_key().await?;

        self.resolver
            .publish_public_key(&self.local, public_key.as_bytes())
            .await
            .map_err(ProtocolError::StoreOperationFailed)?;

        debug!(participant = %self.local, "public key published");
        Ok(public_key)
    }
}

fn invalid_initiator_key(err: &sealroom_crypto::CryptoError) -> ProtocolError {
    ProtocolError::MalformedRecord(RecordError::InvalidField {
        field: fields::INITIATOR_PUBLIC_KEY.to_string(),
        reason: err.to_string(),
    })
}

/// Typed view of an inbound record, checked against its conversation.
fn parse_inbound(
    raw: &RawRecord,
    conversation: &ConversationRecord,
) -> Result<MessageRecord, ProtocolError> {
    let message = MessageRecord::from_raw(raw)?;

    if message.conversation_id != conversation.id {
        return Err(ProtocolError::MalformedRecord(RecordError::InvalidField {
            field: fields::PARENT.to_string(),
            reason: format!(
                "belongs to conversation {}, not {}",
                message.conversation_id, conversation.id
            ),
        }));
    }

    Ok(message)
}

fn open_record(
    message: &MessageRecord,
    thread_key: &ThreadKey,
) -> Result<DecryptedMessage, ProtocolError> {
    let plaintext = Zeroizing::new(open_message(
        &message.ciphertext,
        &message.nonce,
        &message.tag,
        thread_key,
    )?);

    Ok(DecryptedMessage {
        id: message.id.clone(),
        sender: message.sender.clone(),
        text: String::from_utf8_lossy(&plaintext).into_owned(),
        timestamp_ms: message.timestamp_ms,
    })
}
