//! Redb-backed secure key store.
//!
//! Keeps identity key material in a local database file, so a restarted
//! process finds the same identity. Redb's ACID transactions make each
//! `put` all-or-nothing.

use std::{fmt::Display, path::Path, sync::Arc};

use async_trait::async_trait;
use redb::{Database, TableDefinition};
use sealroom_core::{SecureKeyStore, StoreError};
use zeroize::Zeroizing;

/// Table: secret_keys
/// Key: secure-store label (e.g. `sealroom.identity-key.alice`)
/// Value: raw secret bytes
const SECRET_KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("secret_keys");

/// Durable secure key store backed by Redb.
///
/// Clone is cheap (Arc). Blocking database calls run on Tokio's blocking
/// pool, so a Tokio runtime must be active when the trait methods are
/// awaited.
#[derive(Clone)]
pub struct RedbSecureStore {
    db: Arc<Database>,
}

impl RedbSecureStore {
    /// Open or create a key database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the database cannot be opened or
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(unavailable)?;

        let txn = db.begin_write().map_err(unavailable)?;
        {
            let _ = txn.open_table(SECRET_KEYS).map_err(unavailable)?;
        }
        txn.commit().map_err(unavailable)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn get_blocking(db: &Database, label: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        let txn = db.begin_read().map_err(unavailable)?;
        let table = txn.open_table(SECRET_KEYS).map_err(unavailable)?;

        let value = table.get(label).map_err(unavailable)?;
        Ok(value.map(|guard| Zeroizing::new(guard.value().to_vec())))
    }

    fn put_blocking(db: &Database, label: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let txn = db.begin_write().map_err(unavailable)?;
        {
            let mut table = txn.open_table(SECRET_KEYS).map_err(unavailable)?;
            table.insert(label, bytes).map_err(unavailable)?;
        }
        txn.commit().map_err(unavailable)
    }
}

#[async_trait]
impl SecureKeyStore for RedbSecureStore {
    async fn get(&self, label: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StoreError> {
        let db = Arc::clone(&self.db);
        let label = label.to_string();

        tokio::task::spawn_blocking(move || Self::get_blocking(&db, &label))
            .await
            .map_err(unavailable)?
    }

    async fn put(&self, label: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        let label = label.to_string();
        let bytes = Zeroizing::new(bytes.to_vec());

        tokio::task::spawn_blocking(move || Self::put_blocking(&db, &label, &bytes))
            .await
            .map_err(unavailable)?
    }
}

fn unavailable(err: impl Display) -> StoreError {
    StoreError::Unavailable(err.to_string())
}
