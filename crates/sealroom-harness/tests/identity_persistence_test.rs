//! The identity key survives process restarts through a file-backed secure
//! store, and nothing else can stand in for it.

use sealroom_core::{ConversationProtocol, ParticipantId, ProtocolConfig, ProtocolError, SecureKeyStore};
use sealroom_harness::SimEnv;
use sealroom_store::{MemoryKeyDirectory, MemoryMessageStore, MemorySecureStore, RedbSecureStore};
use tempfile::tempdir;

fn alice<K: SecureKeyStore>(
    env: &SimEnv,
    keys: K,
    directory: &MemoryKeyDirectory,
    store: &MemoryMessageStore<SimEnv>,
) -> ConversationProtocol<SimEnv, K, MemoryKeyDirectory, MemoryMessageStore<SimEnv>> {
    ConversationProtocol::new(
        env.clone(),
        ParticipantId::new("alice"),
        keys,
        directory.clone(),
        store.clone(),
        ProtocolConfig::default(),
    )
}

#[tokio::test]
async fn identity_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("alice-keys.redb");
    let env = SimEnv::with_seed(30);
    let directory = MemoryKeyDirectory::new();
    let store = MemoryMessageStore::new(env.clone());

    let (public_key, conversation) = {
        let first_run = alice(&env, RedbSecureStore::open(&path).unwrap(), &directory, &store);
        let public_key = first_run.publish_public_key().await.unwrap();
        let conversation = first_run.start_conversation(&[]).await.unwrap();
        first_run.send_message("written before restart", &conversation).await.unwrap();
        (public_key, conversation)
    };

    let second_run = alice(&env, RedbSecureStore::open(&path).unwrap(), &directory, &store);

    assert_eq!(second_run.local_public_key().await.unwrap(), public_key);
    let history = second_run.history(&conversation).await.unwrap();
    assert_eq!(history.messages.len(), 1);
    assert_eq!(history.messages[0].text, "written before restart");
}

#[tokio::test]
async fn identity_is_stored_under_scoped_label() {
    let env = SimEnv::with_seed(31);
    let keys = MemorySecureStore::new();
    let party = alice(&env, keys.clone(), &MemoryKeyDirectory::new(), &MemoryMessageStore::new(env.clone()));

    party.local_public_key().await.unwrap();

    assert_eq!(party.identity().label(), "sealroom.identity-key.alice");
    let stored = keys.get("sealroom.identity-key.alice").await.unwrap().unwrap();
    assert_eq!(stored.len(), 32);
}

#[tokio::test]
async fn regenerated_identity_cannot_read_old_conversations() {
    let env = SimEnv::with_seed(32);
    let directory = MemoryKeyDirectory::new();
    let store = MemoryMessageStore::new(env.clone());

    let original = alice(&env, MemorySecureStore::new(), &directory, &store);
    let conversation = original.start_conversation(&[]).await.unwrap();
    original.send_message("old secret", &conversation).await.unwrap();

    let replacement = alice(&env, MemorySecureStore::new(), &directory, &store);
    assert_ne!(
        replacement.local_public_key().await.unwrap(),
        original.local_public_key().await.unwrap()
    );

    let result = replacement.history(&conversation).await;
    assert_eq!(result, Err(ProtocolError::AuthenticationFailed { what: "thread key" }));
}

#[tokio::test]
async fn corrupt_stored_identity_is_reported() {
    let env = SimEnv::with_seed(33);
    let keys = MemorySecureStore::new();
    keys.put("sealroom.identity-key.alice", &[0xAB; 7]).await.unwrap();
    let party = alice(&env, keys, &MemoryKeyDirectory::new(), &MemoryMessageStore::new(env.clone()));

    let result = party.start_conversation(&[]).await;

    assert!(matches!(result, Err(ProtocolError::CorruptKeyMaterial { .. })));
}
