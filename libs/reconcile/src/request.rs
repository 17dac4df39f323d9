//! Provisioning requests implied by transitions.
//!
//! Requests the provisioner has not accepted yet are kept as an ordered list,
//! stored next to the rollout state in the same write as the transition that
//! added to it. An entry leaves the list when the provisioner accepts it, or
//! when the rollout state no longer records its digest in a way that needs
//! it. Wire form of a single request: `ensure:<role>:<digest>` or
//! `retire:<digest>`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::ConfigDigest;
use crate::error::StateError;
use crate::spec::NodePoolSpec;
use crate::state::{PoolRole, RolloutState};

/// A provisioning call the pass still owes the provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ProvisionRequest {
    /// Create-or-get the pool for `digest` in `role`.
    Ensure { role: PoolRole, digest: ConfigDigest },
    /// Retire the pool generation at `digest`.
    Retire { digest: ConfigDigest },
}

impl ProvisionRequest {
    pub fn digest(&self) -> &ConfigDigest {
        match self {
            Self::Ensure { digest, .. } | Self::Retire { digest } => digest,
        }
    }

    /// Parse the stored wire form.
    pub fn parse(s: &str) -> Result<Self, StateError> {
        let malformed = || StateError::MalformedRequest(s.to_string());

        let mut parts = s.split(':');
        let request = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("ensure"), Some(role), Some(digest), None) => Self::Ensure {
                role: PoolRole::from_str(role).ok_or_else(malformed)?,
                digest: ConfigDigest::parse(digest)?,
            },
            (Some("retire"), Some(digest), None, None) => Self::Retire {
                digest: ConfigDigest::parse(digest)?,
            },
            _ => return Err(malformed()),
        };
        Ok(request)
    }
}

impl fmt::Display for ProvisionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ensure { role, digest } => write!(f, "ensure:{role}:{digest}"),
            Self::Retire { digest } => write!(f, "retire:{digest}"),
        }
    }
}

/// An owed request, with the spec an ensure is issued with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwedRequest {
    #[serde(serialize_with = "wire_out", deserialize_with = "wire_in")]
    pub request: ProvisionRequest,
    /// Spec of the pool an ensure creates. Kept so the ensure can be retried
    /// after the desired configuration moved on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<NodePoolSpec>,
}

fn wire_out<S: Serializer>(request: &ProvisionRequest, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(request)
}

fn wire_in<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ProvisionRequest, D::Error> {
    let raw = String::deserialize(deserializer)?;
    ProvisionRequest::parse(&raw).map_err(serde::de::Error::custom)
}

/// Ordered list of owed requests, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwedRequests(Vec<OwedRequest>);

impl OwedRequests {
    /// Parse the stored form. An empty value is an empty list.
    pub fn parse(raw: &str) -> Result<Self, StateError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|e| StateError::MalformedRequest(e.to_string()))
    }

    /// Stored form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OwedRequest> {
        self.0.iter()
    }

    pub fn requests(&self) -> impl Iterator<Item = &ProvisionRequest> {
        self.0.iter().map(|owed| &owed.request)
    }

    pub fn contains(&self, request: &ProvisionRequest) -> bool {
        self.requests().any(|r| r == request)
    }

    /// Append `request`. A request already owed keeps its place.
    pub fn push(&mut self, request: ProvisionRequest, spec: Option<NodePoolSpec>) {
        match self.0.iter_mut().find(|owed| owed.request == request) {
            Some(owed) => {
                if spec.is_some() {
                    owed.spec = spec;
                }
            }
            None => self.0.push(OwedRequest { request, spec }),
        }
    }

    /// Drop the given requests, e.g. once the provisioner accepted them.
    pub fn remove_all(&mut self, accepted: &[ProvisionRequest]) {
        self.0.retain(|owed| !accepted.contains(&owed.request));
    }

    /// Drop requests `state` no longer needs and return them.
    ///
    /// An ensure is needed while its digest is recorded as active or
    /// candidate. A retire is needed while its digest is recorded as neither.
    pub fn retain_needed(&mut self, state: &RolloutState) -> Vec<ProvisionRequest> {
        let recorded =
            |d: &ConfigDigest| state.active.as_ref() == Some(d) || state.candidate.as_ref() == Some(d);

        let mut dropped = Vec::new();
        self.0.retain(|owed| {
            let needed = match &owed.request {
                ProvisionRequest::Ensure { digest, .. } => recorded(digest),
                ProvisionRequest::Retire { digest } => !recorded(digest),
            };
            if !needed {
                dropped.push(owed.request.clone());
            }
            needed
        });
        dropped
    }

    /// Whether the candidate recorded in `state` still waits for its ensure to
    /// be accepted.
    pub fn candidate_unconfirmed(&self, state: &RolloutState) -> bool {
        state.candidate.as_ref().is_some_and(|candidate| {
            self.requests().any(|r| match r {
                ProvisionRequest::Ensure {
                    role: PoolRole::Candidate,
                    digest,
                } => digest == candidate,
                _ => false,
            })
        })
    }
}
