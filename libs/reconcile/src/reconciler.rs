//! The blue/green rollout state machine.
//!
//! `decide` looks at the desired digest, the stored rollout state, and the
//! operator's promote flag, and picks exactly one transition. The rules are
//! evaluated in order and the first match wins:
//!
//! 1. **Bootstrap**: nothing recorded yet. The desired digest becomes active.
//! 2. **No-op**: desired equals active, and either there is no candidate or
//!    promotion was not requested.
//! 3. **Promote**: promotion requested and desired equals the candidate. The
//!    candidate becomes active and the candidate slot is cleared.
//! 4. **New candidate**: desired matches neither active nor candidate. It is
//!    recorded as the candidate.
//! 5. Otherwise nothing changes.
//!
//! A candidate left behind when desired reverts to the active digest is not
//! cleaned up here.

use serde::{Deserialize, Serialize};

use crate::digest::ConfigDigest;
use crate::request::ProvisionRequest;
use crate::state::{PoolRole, RolloutState};

/// Why a pass left the rollout state alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// Desired equals active and no candidate is recorded.
    InSync,
    /// Desired equals active while a different candidate is still recorded.
    CandidateRetained,
    /// Desired equals the recorded candidate; waiting for the promote flag.
    AwaitingPromotion,
    /// Promotion was requested but desired is the active digest.
    PromotionNotApplicable,
}

/// The single action taken by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    NoOp {
        reason: NoOpReason,
    },
    Bootstrap {
        digest: ConfigDigest,
    },
    CreateCandidate {
        digest: ConfigDigest,
        /// Candidate recorded before this one, if any. Its pool is not retired.
        replaced: Option<ConfigDigest>,
    },
    Promote {
        previous: ConfigDigest,
        promoted: ConfigDigest,
    },
}

/// Coarse outcome of a pass, as shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    NoChange,
    Bootstrap,
    CandidateCreated,
    Promoted,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoChange => "no-change",
            Self::Bootstrap => "bootstrap",
            Self::CandidateCreated => "candidate-created",
            Self::Promoted => "promoted",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::NoOp { .. } => ActionKind::NoChange,
            Self::Bootstrap { .. } => ActionKind::Bootstrap,
            Self::CreateCandidate { .. } => ActionKind::CandidateCreated,
            Self::Promote { .. } => ActionKind::Promoted,
        }
    }

    /// The provisioning request this action implies, if any.
    pub fn provision_request(&self) -> Option<ProvisionRequest> {
        match self {
            Self::NoOp { .. } => None,
            Self::Bootstrap { digest } => Some(ProvisionRequest::Ensure {
                role: PoolRole::Active,
                digest: digest.clone(),
            }),
            Self::CreateCandidate { digest, .. } => Some(ProvisionRequest::Ensure {
                role: PoolRole::Candidate,
                digest: digest.clone(),
            }),
            Self::Promote { previous, .. } => Some(ProvisionRequest::Retire {
                digest: previous.clone(),
            }),
        }
    }
}

/// Outcome of `decide`: the action and the state it leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub next: RolloutState,
}

impl Transition {
    /// Whether the stored state has to be rewritten.
    pub fn is_mutation(&self) -> bool {
        !matches!(self.action, Action::NoOp { .. })
    }

    fn unchanged(state: &RolloutState, reason: NoOpReason) -> Self {
        Self {
            action: Action::NoOp { reason },
            next: state.clone(),
        }
    }
}

/// Decide the transition for one pass.
pub fn decide(desired: &ConfigDigest, state: &RolloutState, promote: bool) -> Transition {
    let candidate = state.candidate.as_ref();

    // Rule 1
    let Some(active) = state.active.as_ref() else {
        return Transition {
            action: Action::Bootstrap {
                digest: desired.clone(),
            },
            next: RolloutState::stable(desired.clone()),
        };
    };

    // Rule 2
    if desired == active && (candidate.is_none() || !promote) {
        let reason = if candidate.is_none() {
            NoOpReason::InSync
        } else {
            NoOpReason::CandidateRetained
        };
        return Transition::unchanged(state, reason);
    }

    // Rule 3
    if promote && candidate == Some(desired) {
        return Transition {
            action: Action::Promote {
                previous: active.clone(),
                promoted: desired.clone(),
            },
            next: RolloutState::stable(desired.clone()),
        };
    }

    // Rule 4
    if desired != active && candidate != Some(desired) {
        return Transition {
            action: Action::CreateCandidate {
                digest: desired.clone(),
                replaced: candidate.cloned(),
            },
            next: RolloutState::with_candidate(active.clone(), desired.clone()),
        };
    }

    // Rule 5
    let reason = if desired == active {
        NoOpReason::PromotionNotApplicable
    } else {
        NoOpReason::AwaitingPromotion
    };
    Transition::unchanged(state, reason)
}
