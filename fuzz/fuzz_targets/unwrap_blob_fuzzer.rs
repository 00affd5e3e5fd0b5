//! Fuzz target for thread-key blob unwrapping and the blob map codec.
//!
//! Arbitrary blobs and arbitrary public keys must produce an error, never a
//! panic, and must never unwrap to a key unless the blob was produced by
//! `wrap_thread_key` for that pair.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealroom_core::wire::decode_thread_key_blobs;
use sealroom_crypto::{
    IdentityKeyPair, IdentityPublicKey, ThreadKey, derive_wrapping_key, unwrap_thread_key,
    wrap_thread_key,
};

#[derive(Debug, Arbitrary)]
struct Input {
    secret: [u8; 32],
    peer_public: Vec<u8>,
    blob: Vec<u8>,
    blob_map_json: Vec<u8>,
    flip: Option<(u8, u8)>,
}

fuzz_target!(|input: Input| {
    let _ = decode_thread_key_blobs(&input.blob_map_json);

    let local = IdentityKeyPair::from_secret_bytes(input.secret);
    let Ok(peer) = IdentityPublicKey::from_slice(&input.peer_public) else {
        return;
    };
    let Ok(wrapping_key) = derive_wrapping_key(&local, &peer) else {
        return;
    };

    let _ = unwrap_thread_key(&input.blob, &wrapping_key);

    let thread_key = ThreadKey::from_bytes([0x5A; 32]);
    let mut blob = wrap_thread_key(&thread_key, &wrapping_key, [0x11; 24]);

    if let Some((index, mask)) = input.flip {
        if mask != 0 {
            let index = usize::from(index) % blob.len();
            blob[index] ^= mask;
            assert!(unwrap_thread_key(&blob, &wrapping_key).is_err());
            return;
        }
    }

    let Ok(unwrapped) = unwrap_thread_key(&blob, &wrapping_key) else {
        panic!("freshly wrapped blob must unwrap");
    };
    assert_eq!(unwrapped.as_bytes(), thread_key.as_bytes());
});
