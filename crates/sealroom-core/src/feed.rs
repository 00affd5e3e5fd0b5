//! Live decrypted message stream for one conversation.

use tracing::warn;

use crate::{
    boundary::{MessageStore, PublicKeyResolver, SecureKeyStore, Subscription},
    env::Environment,
    protocol::ConversationProtocol,
    record::{ConversationRecord, DecryptedMessage},
};

/// Decrypting view over a store [`Subscription`].
///
/// A record that fails validation or authentication is logged and skipped;
/// it never ends the feed and never surfaces as plaintext.
pub struct MessageFeed<'a, E, K, R, M> {
    protocol: &'a ConversationProtocol<E, K, R, M>,
    conversation: ConversationRecord,
    subscription: Subscription,
    dropped: usize,
}

impl<'a, E, K, R, M> MessageFeed<'a, E, K, R, M>
where
    E: Environment,
    K: SecureKeyStore,
    R: PublicKeyResolver,
    M: MessageStore,
{
    pub(crate) fn new(
        protocol: &'a ConversationProtocol<E, K, R, M>,
        conversation: ConversationRecord,
        subscription: Subscription,
    ) -> Self {
        Self { protocol, conversation, subscription, dropped: 0 }
    }

    /// Conversation being followed.
    pub fn conversation(&self) -> &ConversationRecord {
        &self.conversation
    }

    /// Number of records skipped so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Next message that decrypts successfully. `None` once the store
    /// closes the subscription.
    pub async fn next_message(&mut self) -> Option<DecryptedMessage> {
        while let Some(raw) = self.subscription.recv().await {
            match self.protocol.receive_message(&raw, &self.conversation).await {
                Ok(message) => return Some(message),
                Err(err) => {
                    self.dropped += 1;
                    warn!(
                        conversation = %self.conversation.id,
                        record = %raw.id,
                        error = %err,
                        "dropping undecryptable message"
                    );
                },
            }
        }
        None
    }
}
