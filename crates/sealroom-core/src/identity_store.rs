//! Local identity key lifecycle.
//!
//! The identity key pair is created on first use, persisted under a stable
//! label in a [`SecureKeyStore`], and cached for the lifetime of the store
//! instance. Later calls (and later processes) get the same pair back.

use std::sync::Arc;

use sealroom_crypto::{IdentityKeyPair, SECRET_KEY_SIZE};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::{boundary::SecureKeyStore, env::Environment, error::ProtocolError};

/// Owner of the local long-term key pair.
///
/// Constructed once per local identity and injected into the protocol.
/// Concurrent first calls are serialized by the cache cell, so at most one
/// key pair is ever generated per instance.
pub struct IdentityKeyStore<S, E> {
    env: E,
    store: S,
    label: String,
    cached: OnceCell<Arc<IdentityKeyPair>>,
}

impl<S: SecureKeyStore, E: Environment> IdentityKeyStore<S, E> {
    /// Identity store reading and writing `label` in `store`.
    pub fn new(env: E, store: S, label: impl Into<String>) -> Self {
        Self { env, store, label: label.into(), cached: OnceCell::new() }
    }

    /// Secure-store label of the identity key.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Underlying secure store.
    pub fn secure_store(&self) -> &S {
        &self.store
    }

    /// The local identity key pair, generating and persisting it on first
    /// use.
    ///
    /// # Errors
    ///
    /// - `KeyStoreUnavailable` if the secure store cannot be read or written
    /// - `CorruptKeyMaterial` if stored bytes do not parse
    ///
    /// Neither is retried here; a failed call leaves the cache empty so a
    /// later call starts over.
    pub async fn identity_key_pair(&self) -> Result<Arc<IdentityKeyPair>, ProtocolError> {
        self.cached.get_or_try_init(|| self.load_or_generate()).await.map(Arc::clone)
    }

    async fn load_or_generate(&self) -> Result<Arc<IdentityKeyPair>, ProtocolError> {
        let stored =
            self.store.get(&self.label).await.map_err(ProtocolError::KeyStoreUnavailable)?;

        if let Some(bytes) = stored {
            let key_pair = IdentityKeyPair::from_stored(&bytes)?;
            debug!(label = %self.label, "loaded identity key");
            return Ok(Arc::new(key_pair));
        }

        let mut secret = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        self.env.random_bytes(secret.as_mut_slice());
        let key_pair = IdentityKeyPair::from_secret_bytes(*secret);

        self.store
            .put(&self.label, key_pair.secret_bytes().as_slice())
            .await
            .map_err(ProtocolError::KeyStoreUnavailable)?;

        info!(label = %self.label, public_key = ?key_pair.public_key(), "generated identity key");
        Ok(Arc::new(key_pair))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicU8, AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::error::StoreError;

    #[derive(Clone)]
    struct CountingEnv {
        next: Arc<AtomicU8>,
    }

    impl Environment for CountingEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(self.next.fetch_add(1, Ordering::SeqCst).wrapping_add(1));
        }

        fn wall_clock_millis(&self) -> u64 {
            0
        }
    }

    fn env() -> CountingEnv {
        CountingEnv { next: Arc::new(AtomicU8::new(0)) }
    }

    #[derive(Default)]
    struct MapStore {
        entries: Mutex<HashMap<String, Vec<u8>>>,
        puts: AtomicUsize,
        unavailable: bool,
    }

    #[async_trait]
    impl SecureKeyStore for MapStore {
        async fn get(&self, label: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
            if self.unavailable {
                return Err(StoreError::Unavailable("locked".into()));
            }
            Ok(self.entries.lock().unwrap().get(label).cloned().map(Zeroizing::new))
        }

        async fn put(&self, label: &str, bytes: &[u8]) -> Result<(), StoreError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.entries.lock().unwrap().insert(label.to_string(), bytes.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_call_generates_and_persists() {
        let identity = IdentityKeyStore::new(env(), MapStore::default(), "id");

        let key_pair = identity.identity_key_pair().await.unwrap();

        assert_eq!(identity.secure_store().puts.load(Ordering::SeqCst), 1);
        let stored = identity.secure_store().entries.lock().unwrap().get("id").cloned().unwrap();
        assert_eq!(stored.as_slice(), key_pair.secret_bytes().as_slice());
    }

    #[tokio::test]
    async fn repeated_calls_return_same_pair_without_rewriting() {
        let identity = IdentityKeyStore::new(env(), MapStore::default(), "id");

        let first = identity.identity_key_pair().await.unwrap();
        let second = identity.identity_key_pair().await.unwrap();

        assert_eq!(first.public_key(), second.public_key());
        assert_eq!(identity.secure_store().puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn new_instance_reloads_persisted_pair() {
        let store = MapStore::default();
        let original = {
            let identity = IdentityKeyStore::new(env(), store, "id");
            let key_pair = identity.identity_key_pair().await.unwrap();
            (key_pair.public_key(), identity.store)
        };

        let (public_key, store) = original;
        let reopened = IdentityKeyStore::new(env(), store, "id");
        let reloaded = reopened.identity_key_pair().await.unwrap();

        assert_eq!(reloaded.public_key(), public_key);
        assert_eq!(reopened.secure_store().puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn corrupt_stored_bytes_are_reported() {
        let store = MapStore::default();
        store.entries.lock().unwrap().insert("id".into(), vec![1, 2, 3]);
        let identity = IdentityKeyStore::new(env(), store, "id");

        let result = identity.identity_key_pair().await;
        assert!(matches!(result, Err(ProtocolError::CorruptKeyMaterial { .. })));
    }

    #[tokio::test]
    async fn unavailable_store_is_reported() {
        let store = MapStore { unavailable: true, ..MapStore::default() };
        let identity = IdentityKeyStore::new(env(), store, "id");

        let result = identity.identity_key_pair().await;
        assert!(matches!(result, Err(ProtocolError::KeyStoreUnavailable(StoreError::Unavailable(_)))));
    }
}
