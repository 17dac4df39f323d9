//! A single reconciliation pass for one node pool.
//!
//! The pass:
//! - fingerprints the desired spec (a bad spec aborts before any store access)
//! - takes the pool's lease so no other pass interleaves its read-modify-write
//! - reads the rollout state and the provisioning requests still owed
//! - decides the transition and persists it, together with the request it
//!   implies, before asking the provisioner for anything
//! - issues the owed requests oldest first, then opens the cross-pool bridge
//!   while a candidate exists
//! - takes the lease again to remove the requests the provisioner accepted
//!
//! Store failures are fatal and leave the stored state untouched. Provisioner
//! and bridge failures are reported on the pass and retried on the next one:
//! a request stays recorded until the provisioner accepts it or the rollout
//! state stops needing it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bgpool_id::{ClusterName, HolderId, PassId, PoolName};
use bgpool_reconcile::{
    decide, digest, Action, ActionKind, ConfigDigest, ConfigError, NodePoolSpec, OwedRequest,
    OwedRequests, Phase, PoolHandle, PoolRecord, PoolRole, ProvisionRequest, RolloutState,
    StateError, Transition,
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info, instrument, warn, Span};

use crate::bridge::{BridgeError, NetworkBridge};
use crate::provisioner::{PoolProvisioner, ProvisionError};
use crate::store::{LeaseOutcome, ParamWrite, StateKeys, StateStore, StateStoreError};

/// Errors that abort a pass. Nothing is written when one of these is returned
/// before the persist step, and nothing is requested from the provisioner.
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    StateStore(#[from] StateStoreError),

    #[error("pool {pool} is being reconciled by {holder}")]
    LeaseHeld { pool: PoolName, holder: String },
}

/// Side-effect failures reported on an otherwise completed pass.
#[derive(Debug, Error)]
pub enum SideEffectError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Settings shared by every pass.
#[derive(Debug, Clone)]
pub struct PassSettings {
    pub cluster: ClusterName,
    pub key_prefix: String,
    /// Bound on every store, provisioner, and bridge call.
    pub call_timeout: Duration,
    pub lease_ttl: Duration,
}

/// What a pass did and where the pools ended up.
#[derive(Debug, Serialize)]
pub struct PassReport {
    pub pass_id: PassId,
    pub cluster: ClusterName,
    pub pool: PoolName,
    pub desired: ConfigDigest,
    pub action: Action,
    pub phase: Phase,
    pub active: Option<PoolRecord>,
    pub candidate: Option<PoolRecord>,
    /// Provisioning requests issued during this pass, accepted or not.
    pub provision_requested: Vec<ProvisionRequest>,
    #[serde(serialize_with = "serialize_issue")]
    pub issue: Option<SideEffectError>,
    pub finished_at: DateTime<Utc>,
}

impl PassReport {
    pub fn outcome(&self) -> ActionKind {
        self.action.kind()
    }
}

fn serialize_issue<S>(issue: &Option<SideEffectError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match issue {
        Some(err) => serializer.collect_str(err),
        None => serializer.serialize_none(),
    }
}

/// Runs reconciliation passes against a store, provisioner, and bridge.
pub struct PassRunner {
    settings: PassSettings,
    holder: HolderId,
    store: Arc<dyn StateStore>,
    provisioner: Arc<dyn PoolProvisioner>,
    bridge: Arc<dyn NetworkBridge>,
}

/// Stored state as read at the start of a pass.
struct Stored {
    state: RolloutState,
    normalized: bool,
    owed: OwedRequests,
}

impl PassRunner {
    pub fn new(
        settings: PassSettings,
        store: Arc<dyn StateStore>,
        provisioner: Arc<dyn PoolProvisioner>,
        bridge: Arc<dyn NetworkBridge>,
    ) -> Self {
        Self {
            settings,
            holder: HolderId::new(),
            store,
            provisioner,
            bridge,
        }
    }

    /// Lease holder identity of this runner.
    pub fn holder(&self) -> HolderId {
        self.holder
    }

    pub fn settings(&self) -> &PassSettings {
        &self.settings
    }

    /// Run one pass for `pool`.
    #[instrument(
        skip(self, spec),
        fields(cluster = %self.settings.cluster, pass_id = tracing::field::Empty)
    )]
    pub async fn run_pass(
        &self,
        pool: &PoolName,
        spec: &NodePoolSpec,
        promote: bool,
    ) -> Result<PassReport, PassError> {
        let pass_id = PassId::new();
        Span::current().record("pass_id", tracing::field::display(pass_id));

        let desired = digest(spec)?;
        debug!(desired = %desired, promote, "Starting reconciliation pass");

        let keys = StateKeys::new(&self.settings.key_prefix, &self.settings.cluster, pool);

        self.acquire_lease(pool, &keys).await?;
        let decided = self.decide_and_persist(&keys, &desired, spec, promote).await;
        self.release_lease(&keys).await;
        let (transition, owed) = decided?;

        let mut issue = None;
        let mut provision_requested = Vec::new();
        let mut accepted = Vec::new();

        // Oldest first; stop at the first failure so a pass reports at most
        // one error.
        for entry in owed.iter() {
            match self.issue_request(pool, &desired, spec, entry).await {
                Ok(true) => {
                    provision_requested.push(entry.request.clone());
                    accepted.push(entry.request.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    provision_requested.push(entry.request.clone());
                    issue = Some(SideEffectError::from(e));
                    break;
                }
            }
        }

        if !accepted.is_empty() {
            self.settle_owed(pool, &keys, &accepted).await;
        }

        let next = &transition.next;
        if issue.is_none() && next.phase() == Phase::CandidatePending {
            if let (Some(active), Some(candidate)) = (&next.active, &next.candidate) {
                let active = PoolHandle::canonical(pool, active);
                let candidate = PoolHandle::canonical(pool, candidate);
                if let Err(e) = self.open_bridge(&active, &candidate).await {
                    issue = Some(SideEffectError::from(e));
                }
            }
        }

        let report = PassReport {
            pass_id,
            cluster: self.settings.cluster.clone(),
            pool: pool.clone(),
            desired,
            phase: next.phase(),
            active: next
                .active
                .as_ref()
                .map(|d| PoolRecord::canonical(pool, d, PoolRole::Active)),
            candidate: next
                .candidate
                .as_ref()
                .map(|d| PoolRecord::canonical(pool, d, PoolRole::Candidate)),
            action: transition.action,
            provision_requested,
            issue,
            finished_at: Utc::now(),
        };

        match &report.issue {
            None => info!(
                pool = %report.pool,
                action = %report.outcome(),
                active = ?report.active.as_ref().map(|r| r.handle.as_str()),
                candidate = ?report.candidate.as_ref().map(|r| r.handle.as_str()),
                "Reconciliation pass complete"
            ),
            Some(e) => warn!(
                pool = %report.pool,
                action = %report.outcome(),
                active = ?report.active.as_ref().map(|r| r.handle.as_str()),
                candidate = ?report.candidate.as_ref().map(|r| r.handle.as_str()),
                error = %e,
                "Reconciliation pass complete with errors, will retry"
            ),
        }

        Ok(report)
    }

    /// Read, decide, and persist under the lease.
    ///
    /// Returns the transition and the provisioning requests owed afterwards.
    async fn decide_and_persist(
        &self,
        keys: &StateKeys,
        desired: &ConfigDigest,
        spec: &NodePoolSpec,
        promote: bool,
    ) -> Result<(Transition, OwedRequests), PassError> {
        let stored = self.read_stored(keys).await?;

        // A candidate whose ensure was never accepted may not exist yet.
        let candidate_unconfirmed = stored.owed.candidate_unconfirmed(&stored.state);
        if promote && candidate_unconfirmed {
            warn!("Promotion deferred until the candidate pool request is accepted");
        }

        let transition = decide(desired, &stored.state, promote && !candidate_unconfirmed);

        if !transition.is_mutation() {
            if stored.normalized {
                self.store_call("delete", &keys.candidate(), self.store.delete(&keys.candidate()))
                    .await?;
            }
            debug!(action = ?transition.action, "No state change");
            return Ok((transition, stored.owed));
        }

        let mut owed = stored.owed;
        if let Some(request) = transition.action.provision_request() {
            let spec = matches!(request, ProvisionRequest::Ensure { .. }).then(|| spec.clone());
            owed.push(request, spec);
        }
        for dropped in owed.retain_needed(&transition.next) {
            warn!(
                request = %dropped,
                "Unaccepted provisioning request no longer needed by the rollout state"
            );
        }

        self.persist(keys, &transition.next, &owed).await?;
        info!(
            action = %transition.action.kind(),
            desired = %desired,
            "Rollout state updated"
        );

        Ok((transition, owed))
    }

    async fn read_stored(&self, keys: &StateKeys) -> Result<Stored, StateStoreError> {
        let active = self.read_digest(&keys.active()).await?;
        let candidate = self.read_digest(&keys.candidate()).await?;

        let owed = self.read_owed(keys).await?;

        let mut state = RolloutState { active, candidate };
        let normalized = state.normalize();
        if normalized {
            warn!(
                active = ?state.active,
                "Stored candidate equals active; treating as no candidate"
            );
        }
        state
            .validate()
            .map_err(|e| corrupt(&keys.candidate(), e))?;

        Ok(Stored {
            state,
            normalized,
            owed,
        })
    }

    async fn read_owed(&self, keys: &StateKeys) -> Result<OwedRequests, StateStoreError> {
        let key = keys.pending_request();
        match self.store_call("get", &key, self.store.get(&key)).await? {
            Some(raw) => OwedRequests::parse(&raw).map_err(|e| corrupt(&key, e)),
            None => Ok(OwedRequests::default()),
        }
    }

    fn owed_write(keys: &StateKeys, owed: &OwedRequests) -> Result<ParamWrite, StateStoreError> {
        if owed.is_empty() {
            return Ok(ParamWrite::delete(keys.pending_request()));
        }
        let encoded = owed.to_json().map_err(|e| StateStoreError::Corrupt {
            key: keys.pending_request(),
            reason: e.to_string(),
        })?;
        Ok(ParamWrite::set(keys.pending_request(), encoded))
    }

    async fn read_digest(&self, key: &str) -> Result<Option<ConfigDigest>, StateStoreError> {
        let raw = self.store_call("get", key, self.store.get(key)).await?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => ConfigDigest::parse(value)
                .map(Some)
                .map_err(|e| corrupt(key, e)),
        }
    }

    async fn persist(
        &self,
        keys: &StateKeys,
        next: &RolloutState,
        owed: &OwedRequests,
    ) -> Result<(), StateStoreError> {
        let mut writes = Vec::with_capacity(3);

        if let Some(active) = &next.active {
            writes.push(ParamWrite::set(keys.active(), active.as_str()));
        }
        writes.push(match &next.candidate {
            Some(candidate) => ParamWrite::set(keys.candidate(), candidate.as_str()),
            None => ParamWrite::delete(keys.candidate()),
        });
        writes.push(Self::owed_write(keys, owed)?);

        self.store_call("write", keys.lease(), self.store.write_batch(&writes))
            .await
    }

    /// Issue an owed request. Returns `Ok(false)` when it cannot be issued yet.
    async fn issue_request(
        &self,
        pool: &PoolName,
        desired: &ConfigDigest,
        desired_spec: &NodePoolSpec,
        entry: &OwedRequest,
    ) -> Result<bool, ProvisionError> {
        let timeout = self.settings.call_timeout;
        let request = &entry.request;

        match request {
            ProvisionRequest::Ensure { role, digest } => {
                let spec = match &entry.spec {
                    Some(spec) => spec,
                    None if digest == desired => desired_spec,
                    None => {
                        warn!(
                            request = %request,
                            "Owed ensure has no spec; waiting for it to be desired again"
                        );
                        return Ok(false);
                    }
                };

                let record = PoolRecord::canonical(pool, digest, *role);
                let handle = tokio::time::timeout(
                    timeout,
                    self.provisioner.ensure_pool(&record, spec),
                )
                .await
                .map_err(|_| ProvisionError::Timeout {
                    op: "ensure_pool",
                    handle: record.handle.clone(),
                    timeout,
                })??;

                if handle != record.handle {
                    debug!(canonical = %record.handle, handle = %handle, "Provisioner returned its own handle");
                }
                info!(handle = %record.handle, role = %role, "Pool requested");
            }
            ProvisionRequest::Retire { digest } => {
                let handle = PoolHandle::canonical(pool, digest);
                tokio::time::timeout(timeout, self.provisioner.retire_pool(&handle))
                    .await
                    .map_err(|_| ProvisionError::Timeout {
                        op: "retire_pool",
                        handle: handle.clone(),
                        timeout,
                    })??;
                info!(handle = %handle, "Pool retirement requested");
            }
        }

        Ok(true)
    }

    async fn open_bridge(
        &self,
        active: &PoolHandle,
        candidate: &PoolHandle,
    ) -> Result<(), BridgeError> {
        let timeout = self.settings.call_timeout;
        tokio::time::timeout(timeout, self.bridge.open_bridge(active, candidate))
            .await
            .map_err(|_| BridgeError::Timeout {
                active: active.clone(),
                candidate: candidate.clone(),
                timeout,
            })?
    }

    /// Remove accepted requests from the stored list.
    ///
    /// Runs under the pool lease and re-reads the list, so requests another
    /// pass recorded since this one persisted are kept. When the lease cannot
    /// be had the requests stay owed; issuing them again is harmless.
    async fn settle_owed(&self, pool: &PoolName, keys: &StateKeys, accepted: &[ProvisionRequest]) {
        if let Err(e) = self.acquire_lease(pool, keys).await {
            debug!(error = %e, "Accepted provisioning requests left for a later pass");
            return;
        }

        let settled = self.remove_owed(keys, accepted).await;
        self.release_lease(keys).await;

        if let Err(e) = settled {
            warn!(error = %e, "Failed to clear accepted provisioning requests");
        }
    }

    async fn remove_owed(
        &self,
        keys: &StateKeys,
        accepted: &[ProvisionRequest],
    ) -> Result<(), StateStoreError> {
        let mut owed = self.read_owed(keys).await?;
        let before = owed.len();
        owed.remove_all(accepted);
        if owed.len() == before {
            return Ok(());
        }
        let write = Self::owed_write(keys, &owed)?;
        self.store_call("write", keys.lease(), self.store.write_batch(&[write]))
            .await
    }

    async fn acquire_lease(&self, pool: &PoolName, keys: &StateKeys) -> Result<(), PassError> {
        let outcome = self
            .store_call(
                "lease",
                keys.lease(),
                self.store
                    .try_acquire_lease(keys.lease(), self.holder, self.settings.lease_ttl),
            )
            .await?;

        match outcome {
            LeaseOutcome::Acquired => Ok(()),
            LeaseOutcome::Held { holder } => Err(PassError::LeaseHeld {
                pool: pool.clone(),
                holder,
            }),
        }
    }

    async fn release_lease(&self, keys: &StateKeys) {
        let released = self
            .store_call(
                "release",
                keys.lease(),
                self.store.release_lease(keys.lease(), self.holder),
            )
            .await;
        if let Err(e) = released {
            warn!(error = %e, "Failed to release pool lease; it will expire");
        }
    }

    async fn store_call<T, F>(
        &self,
        op: &'static str,
        key: &str,
        fut: F,
    ) -> Result<T, StateStoreError>
    where
        F: Future<Output = Result<T, StateStoreError>>,
    {
        let timeout = self.settings.call_timeout;
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| StateStoreError::Timeout {
                op,
                key: key.to_string(),
                timeout,
            })?
    }
}

fn corrupt(key: &str, err: StateError) -> StateStoreError {
    StateStoreError::Corrupt {
        key: key.to_string(),
        reason: err.to_string(),
    }
}
