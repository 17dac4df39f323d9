//! Persisted rollout state and pool identities.

use std::fmt;

use bgpool_id::PoolName;
use serde::{Deserialize, Serialize};

use crate::digest::ConfigDigest;
use crate::error::StateError;

/// Role a pool plays in a blue/green rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolRole {
    /// The pool currently serving workloads.
    Active,
    /// A parallel pool validating a configuration change.
    Candidate,
}

impl PoolRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Candidate => "candidate",
        }
    }

    pub(crate) fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "candidate" => Some(Self::Candidate),
            _ => None,
        }
    }
}

impl fmt::Display for PoolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle to a provisioned pool.
///
/// The canonical handle for a pool generation is `<pool>-<digest>`, which lets
/// the handle of an earlier generation be re-derived from stored digests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolHandle(String);

impl PoolHandle {
    /// Wrap a handle returned by a provisioner.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The canonical handle for `pool` at `digest`.
    pub fn canonical(pool: &PoolName, digest: &ConfigDigest) -> Self {
        Self(format!("{pool}-{digest}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pool generation as seen by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub pool: PoolName,
    pub digest: ConfigDigest,
    pub role: PoolRole,
    pub handle: PoolHandle,
}

impl PoolRecord {
    /// Record for `pool` at `digest` under its canonical handle.
    pub fn canonical(pool: &PoolName, digest: &ConfigDigest, role: PoolRole) -> Self {
        Self {
            pool: pool.clone(),
            digest: digest.clone(),
            role,
            handle: PoolHandle::canonical(pool, digest),
        }
    }
}

/// Stored rollout phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing recorded yet.
    Uninitialized,
    /// An active pool, no candidate.
    Stable,
    /// A candidate is recorded and awaits promotion.
    CandidatePending,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Stable => "stable",
            Self::CandidatePending => "candidate_pending",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Active/candidate digests for one pool, as persisted between passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutState {
    pub active: Option<ConfigDigest>,
    pub candidate: Option<ConfigDigest>,
}

impl RolloutState {
    /// State before bootstrap.
    pub fn empty() -> Self {
        Self::default()
    }

    /// An active pool with no candidate.
    pub fn stable(active: ConfigDigest) -> Self {
        Self {
            active: Some(active),
            candidate: None,
        }
    }

    /// An active pool with a candidate awaiting promotion.
    pub fn with_candidate(active: ConfigDigest, candidate: ConfigDigest) -> Self {
        Self {
            active: Some(active),
            candidate: Some(candidate),
        }
    }

    pub fn phase(&self) -> Phase {
        match (&self.active, &self.candidate) {
            (None, _) => Phase::Uninitialized,
            (Some(_), None) => Phase::Stable,
            (Some(_), Some(_)) => Phase::CandidatePending,
        }
    }

    /// Check the active/candidate invariants.
    pub fn validate(&self) -> Result<(), StateError> {
        match (&self.active, &self.candidate) {
            (None, Some(candidate)) => Err(StateError::CandidateWithoutActive {
                candidate: candidate.to_string(),
            }),
            (Some(active), Some(candidate)) if active == candidate => {
                Err(StateError::CandidateEqualsActive {
                    digest: active.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Drop a candidate that equals the active digest.
    ///
    /// A promotion interrupted between its two key writes on a store without
    /// batch atomicity leaves exactly this shape behind. Returns true if the
    /// state was changed.
    pub fn normalize(&mut self) -> bool {
        if self.active.is_some() && self.active == self.candidate {
            self.candidate = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> ConfigDigest {
        ConfigDigest::parse(s).unwrap()
    }

    #[test]
    fn test_phase() {
        assert_eq!(RolloutState::empty().phase(), Phase::Uninitialized);
        assert_eq!(RolloutState::stable(d("abc123")).phase(), Phase::Stable);
        assert_eq!(
            RolloutState::with_candidate(d("abc123"), d("def456")).phase(),
            Phase::CandidatePending
        );
    }

    #[test]
    fn test_validate() {
        assert!(RolloutState::with_candidate(d("abc123"), d("def456"))
            .validate()
            .is_ok());

        let orphan = RolloutState {
            active: None,
            candidate: Some(d("def456")),
        };
        assert!(matches!(
            orphan.validate(),
            Err(StateError::CandidateWithoutActive { .. })
        ));

        let same = RolloutState::with_candidate(d("abc123"), d("abc123"));
        assert!(matches!(
            same.validate(),
            Err(StateError::CandidateEqualsActive { .. })
        ));
    }

    #[test]
    fn test_normalize_interrupted_promotion() {
        let mut state = RolloutState::with_candidate(d("def456"), d("def456"));
        assert!(state.normalize());
        assert_eq!(state, RolloutState::stable(d("def456")));
        assert!(!state.normalize());
    }

    #[test]
    fn test_canonical_handle() {
        let pool = PoolName::parse("workers").unwrap();
        let record = PoolRecord::canonical(&pool, &d("abc123"), PoolRole::Candidate);
        assert_eq!(record.handle.as_str(), "workers-abc123");
        assert_eq!(record.role, PoolRole::Candidate);
    }
}
