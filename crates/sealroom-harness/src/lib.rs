//! Deterministic simulation harness for Sealroom conversations.
//!
//! [`SimEnv`] replaces system randomness and time with a seeded stream and a
//! virtual clock. [`TestCluster`] wires several participants to one shared
//! in-memory record store and key directory, the way independent devices
//! share a remote store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cluster;
pub mod sim_env;

pub use cluster::{Party, TestCluster};
pub use sim_env::{SIM_EPOCH_MILLIS, SimEnv};
