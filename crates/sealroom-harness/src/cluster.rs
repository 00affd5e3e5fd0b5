//! Simulated group of participants sharing one record store and one key
//! directory.

use sealroom_core::{ConversationProtocol, ParticipantId, ProtocolConfig, ProtocolError};
use sealroom_store::{MemoryKeyDirectory, MemoryMessageStore, MemorySecureStore};
use tracing::debug;

use crate::SimEnv;

/// One simulated participant.
pub type Party =
    ConversationProtocol<SimEnv, MemorySecureStore, MemoryKeyDirectory, MemoryMessageStore<SimEnv>>;

/// Participants with private secure stores and a shared record store and
/// key directory. All randomness comes from one seeded [`SimEnv`].
pub struct TestCluster {
    env: SimEnv,
    store: MemoryMessageStore<SimEnv>,
    directory: MemoryKeyDirectory,
    parties: Vec<Party>,
}

impl TestCluster {
    /// Cluster with one party per name. Nothing is published yet.
    pub fn new(seed: u64, names: &[&str]) -> Self {
        let env = SimEnv::with_seed(seed);
        let store = MemoryMessageStore::new(env.clone());
        let directory = MemoryKeyDirectory::new();

        let parties = names
            .iter()
            .map(|name| {
                ConversationProtocol::new(
                    env.clone(),
                    ParticipantId::new(*name),
                    MemorySecureStore::new(),
                    directory.clone(),
                    store.clone(),
                    ProtocolConfig::default(),
                )
            })
            .collect();

        Self { env, store, directory, parties }
    }

    /// Cluster whose parties have all published their public keys.
    pub async fn published(seed: u64, names: &[&str]) -> Result<Self, ProtocolError> {
        let cluster = Self::new(seed, names);
        cluster.publish_all().await?;
        Ok(cluster)
    }

    /// Publish every party's identity public key.
    pub async fn publish_all(&self) -> Result<(), ProtocolError> {
        for party in &self.parties {
            let public_key = party.publish_public_key().await?;
            debug!(participant = %party.local_participant(), ?public_key, "published");
        }
        Ok(())
    }

    /// Party by index, in construction order.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range. Use [`by_name`](Self::by_name)
    /// for a fallible lookup.
    #[allow(clippy::panic, reason = "Test harness accessor")]
    pub fn party(&self, index: usize) -> &Party {
        let Some(party) = self.parties.get(index) else {
            panic!("no party at index {index} (cluster has {})", self.parties.len());
        };
        party
    }

    /// Party by participant name.
    pub fn by_name(&self, name: &str) -> Option<&Party> {
        self.parties.iter().find(|party| party.local_participant().as_str() == name)
    }

    /// All parties, in construction order.
    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    /// Participant identifiers of every party except `index`.
    pub fn others(&self, index: usize) -> Vec<ParticipantId> {
        self.parties
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, party)| party.local_participant().clone())
            .collect()
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Shared record store.
    pub fn store(&self) -> &MemoryMessageStore<SimEnv> {
        &self.store
    }

    /// Shared key directory.
    pub fn directory(&self) -> &MemoryKeyDirectory {
        &self.directory
    }
}
