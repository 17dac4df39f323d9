use thiserror::Error;

/// Errors from validating or fingerprinting a node-pool spec.
///
/// A config error aborts the reconciliation pass before any state is read or
/// written.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid node pool spec: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },

    /// The spec could not be encoded for hashing.
    #[error("failed to serialize node pool spec: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Rollout state that breaks the active/candidate invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A candidate is recorded but no active pool is.
    #[error("candidate {candidate} recorded without an active pool")]
    CandidateWithoutActive { candidate: String },

    /// The candidate digest equals the active digest.
    #[error("candidate digest {digest} equals the active digest")]
    CandidateEqualsActive { digest: String },

    /// A stored digest is not lowercase hex.
    #[error("malformed digest '{0}'")]
    MalformedDigest(String),

    /// A stored pending request could not be parsed.
    #[error("malformed pending request '{0}'")]
    MalformedRequest(String),
}
