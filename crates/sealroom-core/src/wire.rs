//! Persisted encoding of the thread-key blob map.
//!
//! The map is stored as a JSON object from participant identifier to the
//! standard base64 encoding of that participant's blob:
//!
//! ```text
//! {"alice":"<base64 of nonce|sealed key|tag>","bob":"..."}
//! ```

use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::record::{ParticipantId, RecordError, ThreadKeyBlobs, fields};

/// Encode a blob map as base64-in-JSON.
pub fn encode_thread_key_blobs(blobs: &ThreadKeyBlobs) -> Result<Vec<u8>, RecordError> {
    let encoded: BTreeMap<&str, String> =
        blobs.iter().map(|(participant, blob)| (participant.as_str(), STANDARD.encode(blob))).collect();

    serde_json::to_vec(&encoded).map_err(|e| invalid(e.to_string()))
}

/// Decode a base64-in-JSON blob map.
///
/// Any entry that is not valid base64 rejects the whole map; a conversation
/// with a silently missing participant would be worse than a visible error.
pub fn decode_thread_key_blobs(json: &[u8]) -> Result<ThreadKeyBlobs, RecordError> {
    let encoded: BTreeMap<String, String> =
        serde_json::from_slice(json).map_err(|e| invalid(e.to_string()))?;

    encoded
        .into_iter()
        .map(|(participant, blob)| {
            let bytes = STANDARD
                .decode(blob.as_bytes())
                .map_err(|e| invalid(format!("blob for {participant}: {e}")))?;
            Ok((ParticipantId::new(participant), bytes))
        })
        .collect()
}

fn invalid(reason: String) -> RecordError {
    RecordError::InvalidField { field: fields::THREAD_KEY_BLOBS.to_string(), reason }
}
