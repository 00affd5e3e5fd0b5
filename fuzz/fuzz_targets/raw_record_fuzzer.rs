//! Fuzz target for raw record validation.
//!
//! Builds records with arbitrary field names and value kinds and feeds them
//! to the message and conversation decoders. Decoding must never panic, and
//! a record that decodes must re-encode to an equivalent record.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealroom_core::{ConversationRecord, FieldValue, MessageRecord, RawRecord, fields};

const NAMES: [&str; 10] = [
    fields::CIPHERTEXT,
    fields::NONCE,
    fields::TAG,
    fields::SENDER_ID,
    fields::TIMESTAMP,
    fields::SIGNATURE,
    fields::PARENT,
    fields::INITIATOR_PUBLIC_KEY,
    fields::THREAD_KEY_BLOBS,
    "unrelated",
];

#[derive(Debug, Arbitrary)]
enum Value {
    Bytes(Vec<u8>),
    Text(String),
    Timestamp(u64),
}

#[derive(Debug, Arbitrary)]
struct Input {
    id: String,
    fields: Vec<(u8, Value)>,
}

fuzz_target!(|input: Input| {
    let mut raw = RawRecord::new(input.id);
    for (name, value) in input.fields {
        let value = match value {
            Value::Bytes(bytes) => FieldValue::Bytes(bytes),
            Value::Text(text) => FieldValue::Text(text),
            Value::Timestamp(millis) => FieldValue::Timestamp(millis),
        };
        raw.set(NAMES[usize::from(name) % NAMES.len()], value);
    }

    if let Ok(message) = MessageRecord::from_raw(&raw) {
        assert_eq!(MessageRecord::from_raw(&message.to_raw()).ok(), Some(message));
    }

    if let Ok(conversation) = ConversationRecord::from_raw(&raw) {
        let Ok(encoded) = conversation.to_raw() else {
            panic!("decoded conversation must re-encode");
        };
        assert_eq!(ConversationRecord::from_raw(&encoded).ok(), Some(conversation));
    }
});
