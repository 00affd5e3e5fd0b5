//! Fuzz target for message opening.
//!
//! Arbitrary ciphertext, nonce and tag bytes must yield an error, never a
//! panic. Any single-byte change to a sealed message must be detected.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealroom_crypto::{ThreadKey, open_message, seal_message};

#[derive(Debug, Arbitrary)]
struct Input {
    key: [u8; 32],
    ciphertext: Vec<u8>,
    nonce: Vec<u8>,
    tag: Vec<u8>,
    plaintext: Vec<u8>,
    flip: (u16, u8),
}

fuzz_target!(|input: Input| {
    let key = ThreadKey::from_bytes(input.key);

    let _ = open_message(&input.ciphertext, &input.nonce, &input.tag, &key);

    let sealed = seal_message(&input.plaintext, &key, [0x22; 24]);
    let Ok(opened) = sealed.open(&key) else {
        panic!("freshly sealed message must open");
    };
    assert_eq!(opened, input.plaintext);

    let (position, mask) = input.flip;
    if mask == 0 {
        return;
    }

    let mut ciphertext = sealed.ciphertext.clone();
    let mut nonce = sealed.nonce;
    let mut tag = sealed.tag;
    let total = ciphertext.len() + nonce.len() + tag.len();
    let mut index = usize::from(position) % total;

    if index < ciphertext.len() {
        ciphertext[index] ^= mask;
    } else {
        index -= ciphertext.len();
        if index < nonce.len() {
            nonce[index] ^= mask;
        } else {
            tag[index - nonce.len()] ^= mask;
        }
    }

    assert!(open_message(&ciphertext, &nonce, &tag, &key).is_err());
});
