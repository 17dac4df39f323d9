//! bgpool controller library
//!
//! Reconciles blue/green node pools. For every desired pool the controller
//! fingerprints the configuration, compares it against the rollout state kept
//! in a state store, and applies at most one transition per pass: bootstrap
//! the first pool, stand up a candidate beside the active pool, or promote
//! the candidate once an operator asks for it.
//!
//! ## Modules
//!
//! - `store`: state store contract, key layout, SQLite and in-memory adapters
//! - `provisioner`: pool provisioner contract and a recording implementation
//! - `bridge`: cross-pool network bridge contract
//! - `pass`: one reconciliation pass for one pool
//! - `controller`: periodic ticks across all pools
//! - `config`, `pools`: environment configuration and the desired pools file

pub mod bridge;
pub mod config;
pub mod controller;
pub mod pass;
pub mod pools;
pub mod provisioner;
pub mod store;

// Re-export commonly used types
pub use bridge::{BridgeError, NetworkBridge, RecordingBridge};
pub use controller::{Controller, PoolOutcome, PoolSource, TickSummary};
pub use pass::{PassError, PassReport, PassRunner, PassSettings, SideEffectError};
pub use pools::{load_pools, DesiredPool};
pub use provisioner::{PoolProvisioner, ProvisionCall, ProvisionError, RecordingProvisioner};
pub use store::{InMemoryStateStore, SqliteStateStore, StateKeys, StateStore, StateStoreError};
