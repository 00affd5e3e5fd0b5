//! Inbound records are untrusted: anything that fails validation or
//! authentication is dropped without hiding the messages around it.

use sealroom_core::{FieldValue, ParticipantId, ProtocolError, RawRecord, fields};
use sealroom_harness::TestCluster;

fn id(name: &str) -> ParticipantId {
    ParticipantId::new(name)
}

fn flip_first_byte(raw: &mut RawRecord, field: &str) {
    if let Some(FieldValue::Bytes(bytes)) = raw.get_mut(field) {
        bytes[0] ^= 0x01;
    }
}

#[tokio::test]
async fn tampered_fields_fail_authentication() {
    let cluster = TestCluster::published(20, &["alice", "bob"]).await.unwrap();
    let conversation = cluster.party(0).start_conversation(&[id("bob")]).await.unwrap();
    let sent = cluster.party(0).send_message("integrity", &conversation).await.unwrap();

    for field in [fields::CIPHERTEXT, fields::NONCE, fields::TAG] {
        let mut raw = sent.to_raw();
        flip_first_byte(&mut raw, field);

        let result = cluster.party(1).receive_message(&raw, &conversation).await;
        assert_eq!(result, Err(ProtocolError::AuthenticationFailed { what: "message" }), "field {field}");
    }
}

#[tokio::test]
async fn history_skips_tampered_records() {
    let cluster = TestCluster::published(21, &["alice", "bob"]).await.unwrap();
    let conversation = cluster.party(0).start_conversation(&[id("bob")]).await.unwrap();

    for text in ["one", "two", "three"] {
        cluster.party(0).send_message(text, &conversation).await.unwrap();
    }
    cluster.store().tamper_messages(&conversation.id, |index, raw| {
        if index == 1 {
            flip_first_byte(raw, fields::TAG);
        }
    });

    let history = cluster.party(1).history(&conversation).await.unwrap();

    let texts: Vec<_> = history.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "three"]);
    assert_eq!(history.dropped, 1);
}

#[tokio::test]
async fn history_skips_records_with_missing_fields() {
    let cluster = TestCluster::published(22, &["alice", "bob"]).await.unwrap();
    let conversation = cluster.party(0).start_conversation(&[id("bob")]).await.unwrap();
    cluster.party(0).send_message("kept", &conversation).await.unwrap();

    let mut stripped = cluster.party(0).send_message("stripped", &conversation).await.unwrap().to_raw();
    stripped.id = "stripped-copy".into();
    stripped.remove(fields::NONCE);
    cluster.store().inject_message(&conversation.id, stripped);

    let history = cluster.party(1).history(&conversation).await.unwrap();

    let texts: Vec<_> = history.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["kept", "stripped"]);
    assert_eq!(history.dropped, 1);
}

#[tokio::test]
async fn forged_message_under_foreign_key_is_dropped() {
    let cluster = TestCluster::published(23, &["alice", "bob", "eve"]).await.unwrap();
    let conversation = cluster.party(0).start_conversation(&[id("bob")]).await.unwrap();
    cluster.party(0).send_message("genuine", &conversation).await.unwrap();

    let eve = cluster.by_name("eve").unwrap();
    let eves_room = eve.start_conversation(&[]).await.unwrap();
    let mut forged = eve.send_message("forged", &eves_room).await.unwrap();
    forged.conversation_id = conversation.id.clone();
    cluster.store().inject_message(&conversation.id, forged.to_raw());

    let history = cluster.party(1).history(&conversation).await.unwrap();

    let texts: Vec<_> = history.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["genuine"]);
    assert_eq!(history.dropped, 1);
}

#[tokio::test]
async fn tampered_blob_fails_thread_key_recovery() {
    let cluster = TestCluster::published(24, &["alice", "bob"]).await.unwrap();
    let mut conversation = cluster.party(0).start_conversation(&[id("bob")]).await.unwrap();
    cluster.party(0).send_message("sealed", &conversation).await.unwrap();

    if let Some(blob) = conversation.encrypted_thread_keys.get_mut(&id("bob")) {
        blob[30] ^= 0x80;
    }

    let result = cluster.party(1).history(&conversation).await;
    assert_eq!(result, Err(ProtocolError::AuthenticationFailed { what: "thread key" }));
}

#[tokio::test]
async fn substituted_initiator_key_fails_thread_key_recovery() {
    let cluster = TestCluster::published(25, &["alice", "bob", "eve"]).await.unwrap();
    let mut conversation = cluster.party(0).start_conversation(&[id("bob")]).await.unwrap();
    conversation.initiator_public_key = cluster.by_name("eve").unwrap().local_public_key().await.unwrap().to_vec();

    let result = cluster.party(1).send_message("hi", &conversation).await;

    assert!(matches!(result, Err(ref err) if err.is_authentication_failure()));
    assert_eq!(cluster.store().message_count(&conversation.id), 0);
}

#[tokio::test]
async fn feed_skips_bad_records_without_blocking() {
    let cluster = TestCluster::published(26, &["alice", "bob"]).await.unwrap();
    let conversation = cluster.party(0).start_conversation(&[id("bob")]).await.unwrap();
    let mut feed = cluster.party(1).feed(&conversation).await.unwrap();

    let first = cluster.party(0).send_message("first", &conversation).await.unwrap();

    let mut bad = first.to_raw();
    bad.id = "bad".into();
    flip_first_byte(&mut bad, fields::CIPHERTEXT);
    cluster.store().inject_message(&conversation.id, bad);
    cluster.store().inject_message(&conversation.id, RawRecord::new("empty"));

    cluster.party(0).send_message("second", &conversation).await.unwrap();

    assert_eq!(feed.next_message().await.unwrap().text, "first");
    assert_eq!(feed.next_message().await.unwrap().text, "second");
    assert_eq!(feed.dropped(), 2);
}
