//! Blue/green node-pool rollout primitives.
//!
//! This library holds the pure half of the node-pool reconciler. Nothing in
//! here performs I/O; callers feed it the desired configuration and whatever
//! rollout state they read from their store, and get back a decision. Key
//! concepts:
//!
//! - **Config digest**: a short, stable fingerprint of a node pool's desired
//!   configuration. Drift is detected by comparing digests.
//! - **Rollout state**: the digests of the active pool and, while a change is
//!   being validated, of a candidate pool running alongside it.
//! - **Transition**: the single action a reconciliation pass takes, together
//!   with the rollout state it leaves behind.
//!
//! # Invariants
//!
//! - Identical specs always yield identical digests, regardless of map order
//! - Decisions are deterministic given the same inputs
//! - At most one transition is applied per pass
//! - A candidate digest never equals the active digest

mod digest;
mod error;
mod reconciler;
mod request;
mod spec;
mod state;

use std::time::Duration;

pub use digest::{digest, ConfigDigest, DIGEST_LEN};
pub use error::{ConfigError, StateError};
pub use reconciler::{decide, Action, ActionKind, NoOpReason, Transition};
pub use request::{OwedRequest, OwedRequests, ProvisionRequest};
pub use spec::{CpuArch, NodePoolSpec, Taint, TaintEffect};
pub use state::{Phase, PoolHandle, PoolRecord, PoolRole, RolloutState};

/// Default reconciliation interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);
