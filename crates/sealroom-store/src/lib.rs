//! Sealroom Stores
//!
//! Implementations of the collaborators [`sealroom_core`] drives:
//!
//! - [`MemoryMessageStore`], [`MemoryKeyDirectory`], [`MemorySecureStore`]:
//!   shared in-memory state for tests, simulation and demos
//! - [`RedbSecureStore`]: file-backed identity key storage that survives
//!   process restarts
//! - [`FaultyMessageStore`], [`FaultyKeyDirectory`]: deterministic fault
//!   injection around any store or directory
//! - [`SystemEnv`]: production environment (system clock, OS randomness)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod faulty;
mod memory;
mod redb;
mod system_env;

pub use faulty::{FaultyKeyDirectory, FaultyMessageStore, StoreOp};
pub use memory::{MemoryKeyDirectory, MemoryMessageStore, MemorySecureStore};
pub use system_env::SystemEnv;

pub use self::redb::RedbSecureStore;
