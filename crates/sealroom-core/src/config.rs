//! Protocol configuration.

use serde::{Deserialize, Serialize};

use crate::record::ParticipantId;

/// Default secure-store label prefix.
pub const DEFAULT_KEY_LABEL_PREFIX: &str = "sealroom";

/// Default participant limit per conversation, initiator included.
pub const DEFAULT_MAX_PARTICIPANTS: usize = 256;

/// Default plaintext limit per message (64 KiB).
pub const DEFAULT_MAX_PLAINTEXT_LEN: usize = 64 * 1024;

/// Tunables for [`crate::ConversationProtocol`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Prefix of the secure-store label holding the identity key
    pub key_label_prefix: String,
    /// Maximum participants in one conversation, initiator included
    pub max_participants: usize,
    /// Maximum plaintext bytes in one message
    pub max_plaintext_len: usize,
}

impl ProtocolConfig {
    /// Stable, identity-scoped label of the identity key in the secure store.
    pub fn identity_label(&self, participant: &ParticipantId) -> String {
        format!("{}.identity-key.{participant}", self.key_label_prefix)
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            key_label_prefix: DEFAULT_KEY_LABEL_PREFIX.to_string(),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            max_plaintext_len: DEFAULT_MAX_PLAINTEXT_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_label_is_scoped_per_participant() {
        let config = ProtocolConfig::default();

        assert_eq!(config.identity_label(&ParticipantId::new("alice")), "sealroom.identity-key.alice");
        assert_ne!(
            config.identity_label(&ParticipantId::new("alice")),
            config.identity_label(&ParticipantId::new("bob"))
        );
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: ProtocolConfig = serde_json::from_str(r#"{"max_participants": 8}"#).unwrap();

        assert_eq!(config.max_participants, 8);
        assert_eq!(config.key_label_prefix, DEFAULT_KEY_LABEL_PREFIX);
        assert_eq!(config.max_plaintext_len, DEFAULT_MAX_PLAINTEXT_LEN);
    }
}
